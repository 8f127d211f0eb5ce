use core::fmt::{self, Display, Formatter};
use std::collections::HashMap;

use burner_common::address::strip_path;

/// ESMTP parameters given after the reverse-path of `MAIL FROM`
/// (RFC 5321 Section 3.3).
///
/// Keys are kept uppercased. Only `SIZE` (RFC 1870) is acted upon; anything
/// else is accepted and ignored.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct MailParameters {
    params: HashMap<String, Option<String>>,
}

impl MailParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `KEY=VALUE` and `FLAG` tokens separated by whitespace.
    ///
    /// # Errors
    ///
    /// If a parameter is repeated, or `SIZE` is not a positive number.
    pub fn from_params_str(params_str: &str) -> Result<Self, String> {
        let mut params = Self::new();

        for token in params_str.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .map_or((token, None), |(key, value)| (key, Some(value)));
            let key = key.to_ascii_uppercase();

            if params.has(&key) {
                return Err(format!("Duplicate parameter '{key}' not allowed"));
            }

            if key == "SIZE" {
                match value.map(str::parse::<usize>) {
                    Some(Ok(0)) => return Err(String::from("SIZE=0 is not allowed")),
                    Some(Ok(_)) => {}
                    _ => return Err(format!("Invalid SIZE value: {}", value.unwrap_or_default())),
                }
            }

            params.params.insert(key, value.map(ToString::to_string));
        }

        Ok(params)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.params
            .insert(key.to_ascii_uppercase(), Some(value.into()));
    }

    /// Gets a parameter value by key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(&key.to_ascii_uppercase())?.as_deref()
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(&key.to_ascii_uppercase())
    }

    /// The declared message size, if the client sent one.
    pub fn size(&self) -> Option<usize> {
        self.get("SIZE")?.parse().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl Display for MailParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.params.iter().collect();
        keys.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

        for (n, (key, value)) in keys.into_iter().enumerate() {
            if n > 0 {
                f.write_str(" ")?;
            }
            match value {
                None => f.write_str(key)?,
                Some(value) => write!(f, "{key}={value}")?,
            }
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Hash, Debug)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl HeloVariant {
    pub fn host(&self) -> &str {
        match self {
            Self::Ehlo(host) | Self::Helo(host) => host,
        }
    }
}

impl Display for HeloVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
        })
    }
}

#[derive(Eq, PartialEq, Debug)]
pub enum Command {
    Helo(HeloVariant),
    /// An empty sender is the null reverse-path `<>`.
    MailFrom(String, MailParameters),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Help,
    Quit,
    Auth,
    StartTls,
    Invalid(String),
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(v) => write!(fmt, "{v} {}", v.host()),
            Self::MailFrom(from, params) if params.is_empty() => write!(fmt, "MAIL FROM:<{from}>"),
            Self::MailFrom(from, params) => write!(fmt, "MAIL FROM:<{from}> {params}"),
            Self::RcptTo(to) => write!(fmt, "RCPT TO:<{to}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Help => fmt.write_str("HELP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Auth => fmt.write_str("AUTH"),
            Self::StartTls => fmt.write_str("STARTTLS"),
            Self::Invalid(s) => fmt.write_str(s),
        }
    }
}

/// Checks for `prefix` at the start of `line`, ignoring ASCII case, and
/// returns what follows it.
fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Splits `<path> params` into its path and the remaining parameter text.
fn split_path(rest: &str) -> (&str, &str) {
    let rest = rest.trim();

    if rest.starts_with('<') {
        rest.find('>')
            .map_or((rest, ""), |end| (&rest[..=end], &rest[end + 1..]))
    } else {
        rest.split_once(char::is_whitespace).unwrap_or((rest, ""))
    }
}

/// A usable address out of a path: bracketed, or bare with an `@`.
fn address(path: &str) -> Option<&str> {
    let bracketed = path.trim_start().starts_with('<');
    strip_path(path).filter(|address| bracketed || address.contains('@'))
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let trimmed = command.trim();
        let invalid = || Self::Invalid(command.to_owned());

        if let Some(rest) = strip_prefix_ignore_case(trimmed, "MAIL FROM:") {
            let (path, params) = split_path(rest);
            let params = MailParameters::from_params_str(params).map_err(Self::Invalid)?;

            address(path)
                .map(|from| Self::MailFrom(from.to_string(), params))
                .ok_or_else(invalid)
        } else if let Some(rest) = strip_prefix_ignore_case(trimmed, "RCPT TO:") {
            let (path, _) = split_path(rest);

            address(path)
                .filter(|to| !to.is_empty())
                .map(|to| Self::RcptTo(to.to_string()))
                .ok_or_else(invalid)
        } else if let Some((verb, host)) = trimmed.split_once(' ') {
            let host = host.trim().to_string();
            if verb.eq_ignore_ascii_case("EHLO") {
                Ok(Self::Helo(HeloVariant::Ehlo(host)))
            } else if verb.eq_ignore_ascii_case("HELO") {
                Ok(Self::Helo(HeloVariant::Helo(host)))
            } else if verb.eq_ignore_ascii_case("AUTH") {
                Ok(Self::Auth)
            } else if verb.eq_ignore_ascii_case("HELP") {
                Ok(Self::Help)
            } else if verb.eq_ignore_ascii_case("NOOP") {
                Ok(Self::Noop)
            } else {
                Err(invalid())
            }
        } else {
            match trimmed.to_ascii_uppercase().as_str() {
                "DATA" => Ok(Self::Data),
                "RSET" => Ok(Self::Rset),
                "NOOP" => Ok(Self::Noop),
                "HELP" => Ok(Self::Help),
                "QUIT" => Ok(Self::Quit),
                "AUTH" => Ok(Self::Auth),
                "STARTTLS" => Ok(Self::StartTls),
                _ => Err(invalid()),
            }
        }
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Self;

    fn try_from(command: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(command).map_or_else(
            |_| Err(Self::Invalid("Unable to interpret command".to_string())),
            Self::try_from,
        )
    }
}

impl TryFrom<String> for Command {
    type Error = Self;

    fn try_from(command: String) -> Result<Self, Self::Error> {
        Self::try_from(command.as_str())
    }
}
