//! Helpers for the plain-string mailbox addresses carried in an envelope.
//!
//! Envelope addresses are kept verbatim as the client sent them (minus the
//! angle brackets). Nothing here validates an address; the alias of a
//! malformed address is simply the whole string.

/// The local-part of `address`, i.e. everything before the first `@`.
///
/// An address without any `@` yields itself.
///
/// ```
/// use burner_common::address::local_part;
///
/// assert_eq!(local_part("bob@example.com"), "bob");
/// assert_eq!(local_part("postmaster"), "postmaster");
/// ```
pub fn local_part(address: &str) -> &str {
    address
        .split_once('@')
        .map_or(address, |(local, _)| local)
}

/// The domain of `address`, i.e. everything after the last `@`.
///
/// An address without any `@` yields itself, which never matches a real
/// domain.
pub fn domain_part(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map_or(address, |(_, domain)| domain)
}

/// Checks whether any of `recipients` is addressed to `alias`.
///
/// Matching is exact and case-sensitive on the local-part: `bob` does not
/// match `Bob@x` nor `bob2@x`.
pub fn addressed_to<S: AsRef<str>>(recipients: &[S], alias: &str) -> bool {
    recipients
        .iter()
        .any(|recipient| local_part(recipient.as_ref()) == alias)
}

/// Strips a reverse-path or forward-path down to the bare address.
///
/// `<bob@example.com>` becomes `bob@example.com`, the null path `<>` becomes
/// the empty string, and an unbracketed path is returned trimmed.
/// Returns `None` if an opening bracket is never closed.
pub fn strip_path(path: &str) -> Option<&str> {
    let path = path.trim();

    path.strip_prefix('<').map_or(Some(path), |rest| {
        rest.find('>').map(|end| rest[..end].trim())
    })
}
