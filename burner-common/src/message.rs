//! The stored form of a delivered message, and how it is built from the raw
//! bytes a client sends after `DATA`.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use mailparse::MailHeader;
use serde::{Deserialize, Serialize};

use crate::{address::addressed_to, error::ParseError};

/// Sender and accepted recipients of one mail transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Raw reverse-path; empty for bounces.
    pub sender: String,
    /// Accepted forward-paths in the order they were given, duplicates kept.
    pub recipients: Vec<String>,
}

impl Envelope {
    pub fn new(sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            sender: sender.into(),
            recipients,
        }
    }

    pub fn clear(&mut self) {
        self.sender.clear();
        self.recipients.clear();
    }
}

/// One header name with every value it was given, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderField {
    pub name: String,
    pub values: Vec<String>,
}

/// Header fields keyed case-insensitively.
///
/// The first spelling of a name is kept for display, and fields stay in the
/// order they first appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderFields(Vec<HeaderField>);

impl HeaderFields {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();

        if let Some(field) = self
            .0
            .iter_mut()
            .find(|field| field.name.eq_ignore_ascii_case(&name))
        {
            field.values.push(value.into());
        } else {
            self.0.push(HeaderField {
                name,
                values: vec![value.into()],
            });
        }
    }

    /// Every value of `name`, in the order they appeared.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
            .map(|field| field.values.as_slice())
    }

    /// The first value of `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(<[String]>::first)
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'h, 'a> FromIterator<&'h MailHeader<'a>> for HeaderFields {
    fn from_iter<T: IntoIterator<Item = &'h MailHeader<'a>>>(iter: T) -> Self {
        let mut fields = Self::default();
        for header in iter {
            fields.push(header.get_key(), unfold(header.get_value_raw()));
        }
        fields
    }
}

/// A parsed message that has not been given an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub received_at: DateTime<Utc>,
    pub envelope: Envelope,
    pub headers: HeaderFields,
    pub subject: String,
    pub body: Vec<u8>,
    pub raw: Vec<u8>,
}

impl MessageDraft {
    /// Split `raw` into headers and body at the first blank line.
    ///
    /// A stream with no headers, or no body, is still a message. A subject
    /// that cannot be decoded keeps its raw header text.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the header block is not a header block at
    /// all.
    pub fn parse(
        envelope: Envelope,
        raw: Vec<u8>,
        received_at: DateTime<Utc>,
    ) -> Result<Self, ParseError> {
        let (headers, subject, body) = {
            let (parsed, body_offset) = mailparse::parse_headers(&raw)?;

            let subject = parsed
                .iter()
                .find(|header| header.get_key_ref().eq_ignore_ascii_case("Subject"))
                .map(decode_subject)
                .unwrap_or_default();
            let body = raw.get(body_offset..).map(<[u8]>::to_vec).unwrap_or_default();

            (parsed.iter().collect::<HeaderFields>(), subject, body)
        };

        Ok(Self {
            received_at,
            envelope,
            headers,
            subject,
            body,
            raw,
        })
    }

    /// Fix the draft under `id`. Nothing about a message changes after this.
    pub fn assign(self, id: u64) -> Message {
        Message {
            id,
            received_at: self.received_at,
            sender: self.envelope.sender,
            recipients: self.envelope.recipients,
            headers: self.headers,
            subject: self.subject,
            body: self.body,
            raw: self.raw,
        }
    }
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub received_at: DateTime<Utc>,
    pub sender: String,
    pub recipients: Vec<String>,
    pub headers: HeaderFields,
    pub subject: String,
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub raw: Vec<u8>,
}

impl Message {
    /// Checks whether one of the recipients has `alias` as its local-part.
    pub fn is_for(&self, alias: &str) -> bool {
        addressed_to(&self.recipients, alias)
    }

    /// Size of the message as received.
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

fn decode_subject(header: &MailHeader<'_>) -> String {
    let decoded = header.get_value();

    if decoded.contains(char::REPLACEMENT_CHARACTER) {
        unfold(header.get_value_raw())
    } else {
        decoded
    }
}

/// Join folded header lines back into one.
fn unfold(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn envelope() -> Envelope {
        Envelope::new("a@x.test", vec!["bob@y.test".to_string()])
    }

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn parse(raw: &[u8]) -> MessageDraft {
        MessageDraft::parse(envelope(), raw.to_vec(), received_at()).unwrap()
    }

    #[test]
    fn splits_headers_and_body() {
        let raw = b"From: a@x.test\r\nSubject: Hello\r\n\r\nHi Bob\r\n";
        let draft = parse(raw);

        assert_eq!(draft.subject, "Hello");
        assert_eq!(draft.body, b"Hi Bob\r\n");
        assert_eq!(draft.raw, raw);
        assert_eq!(draft.headers.first("from"), Some("a@x.test"));
        assert_eq!(draft.headers.len(), 2);
    }

    #[test]
    fn decodes_encoded_word_subjects() {
        let draft = parse(b"Subject: =?UTF-8?B?SGVsbG8gV29ybGQ=?=\r\n\r\nbody");
        assert_eq!(draft.subject, "Hello World");

        let draft = parse(b"Subject: =?ISO-8859-1?Q?Caf=E9?=\r\n\r\n");
        assert_eq!(draft.subject, "Caf\u{e9}");

        // The header map keeps what was on the wire.
        assert_eq!(
            draft.headers.first("Subject"),
            Some("=?ISO-8859-1?Q?Caf=E9?=")
        );
    }

    #[test]
    fn undecodable_subject_falls_back_to_raw() {
        let draft = parse(b"Subject: =?UTF-8?B?/w==?=\r\n\r\n");
        assert_eq!(draft.subject, "=?UTF-8?B?/w==?=");
    }

    #[test]
    fn missing_subject_is_empty() {
        let draft = parse(b"From: a@x.test\r\n\r\nno subject here");
        assert_eq!(draft.subject, "");
        assert_eq!(draft.body, b"no subject here");
    }

    #[test]
    fn empty_message_is_accepted() {
        let draft = parse(b"");
        assert!(draft.headers.is_empty());
        assert!(draft.body.is_empty());
        assert!(draft.raw.len() >= draft.body.len());
    }

    #[test]
    fn repeated_and_folded_headers() {
        let raw = b"Received: one\r\nreceived: two\r\nX-Long: first\r\n  second\r\n\r\n";
        let draft = parse(raw);

        let received: Vec<&str> = draft
            .headers
            .get("RECEIVED")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(received, vec!["one", "two"]);
        assert_eq!(draft.headers.first("x-long"), Some("first second"));

        let names: Vec<&str> = draft.headers.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Received", "X-Long"]);
    }

    #[test]
    fn garbage_is_not_a_message() {
        let result = MessageDraft::parse(
            envelope(),
            b" starts folded\r\n\r\nbody".to_vec(),
            received_at(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn assign_keeps_everything() {
        let draft = parse(b"Subject: s\r\n\r\nbody");
        let message = draft.clone().assign(7);

        assert_eq!(message.id, 7);
        assert_eq!(message.received_at, draft.received_at);
        assert_eq!(message.sender, "a@x.test");
        assert_eq!(message.recipients, vec!["bob@y.test".to_string()]);
        assert_eq!(message.subject, "s");
        assert_eq!(message.body_text(), "body");
        assert_eq!(message.size(), draft.raw.len());
        assert!(message.is_for("bob"));
        assert!(!message.is_for("bo"));
    }

    #[test]
    fn json_form() {
        let message = parse(b"Subject: s\r\n\r\nbody").assign(3);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["body"], "Ym9keQ==");
        assert_eq!(json["headers"][0]["name"], "Subject");
        assert_eq!(json["headers"][0]["values"][0], "s");
        assert_eq!(json["received_at"], "2024-03-01T12:00:00Z");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }
}
