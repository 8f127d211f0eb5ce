use serde::{Deserialize, Serialize};

use crate::address::domain_part;

/// Decides which recipient addresses are worth keeping.
///
/// With no accepted domains configured every address is accepted, which is
/// the usual mode for a throwaway mailbox host sitting behind an MX record.
///
/// ```ron
/// policy: (
///     accepted_domains: ["example.com"],
///     accept_subdomains: true,
/// ),
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainPolicy {
    #[serde(default)]
    accepted_domains: Vec<String>,
    #[serde(default)]
    accept_subdomains: bool,
}

impl DomainPolicy {
    pub fn new<I, S>(accepted_domains: I, accept_subdomains: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted_domains: accepted_domains.into_iter().map(Into::into).collect(),
            accept_subdomains,
        }
    }

    /// A policy that accepts every address.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn accepted_domains(&self) -> &[String] {
        &self.accepted_domains
    }

    pub const fn accepts_subdomains(&self) -> bool {
        self.accept_subdomains
    }

    /// Checks whether mail for `address` should be stored.
    ///
    /// The domain is whatever follows the last `@`, compared without regard
    /// to ASCII case. When subdomains are accepted, `x@a.example.com` matches
    /// a configured `example.com`, but `x@badexample.com` does not.
    pub fn is_accepted(&self, address: &str) -> bool {
        if self.accepted_domains.is_empty() {
            return true;
        }

        let domain = domain_part(address);

        self.accepted_domains.iter().any(|accepted| {
            domain.eq_ignore_ascii_case(accepted)
                || (self.accept_subdomains && is_subdomain_of(domain, accepted))
        })
    }
}

/// `domain` ends in `.parent` with at least one label in front of it.
fn is_subdomain_of(domain: &str, parent: &str) -> bool {
    let (domain, parent) = (domain.as_bytes(), parent.as_bytes());

    if domain.len() <= parent.len() + 1 {
        return false;
    }

    let split = domain.len() - parent.len();
    domain[split - 1] == b'.' && domain[split..].eq_ignore_ascii_case(parent)
}
