//! Property-based tests for SMTP command parsing.

use burner_smtp::command::Command;
use proptest::prelude::*;

fn domain_strategy() -> impl Strategy<Value = String> {
    #[allow(
        clippy::expect_used,
        reason = "compile-time constant regex should be valid"
    )]
    let regex = prop::string::string_regex("[a-z]{3,10}\\.[a-z]{2,5}")
        .expect("domain regex should be valid");
    regex
}

/// Dot-atoms of common atext characters.
fn alias_strategy() -> impl Strategy<Value = String> {
    #[allow(
        clippy::expect_used,
        reason = "compile-time constant regex should be valid"
    )]
    let atom = prop::string::string_regex("[a-z0-9+_-]{1,10}").expect("atom regex should be valid");

    prop::collection::vec(atom, 1..=3).prop_map(|atoms| atoms.join("."))
}

fn email_strategy() -> impl Strategy<Value = String> {
    (alias_strategy(), domain_strategy()).prop_map(|(alias, domain)| format!("{alias}@{domain}"))
}

fn simple_command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("QUIT".to_string()),
        Just("RSET".to_string()),
        Just("NOOP".to_string()),
        Just("DATA".to_string()),
        Just("HELP".to_string()),
        Just("STARTTLS".to_string()),
        Just("AUTH".to_string()),
    ]
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        simple_command_strategy(),
        (prop_oneof![Just("HELO"), Just("EHLO")], domain_strategy())
            .prop_map(|(cmd, domain)| format!("{cmd} {domain}")),
        email_strategy().prop_map(|email| format!("MAIL FROM:<{email}>")),
        email_strategy().prop_map(|email| format!("RCPT TO:<{email}>")),
    ]
}

proptest! {
    #[test]
    fn recipients_survive_parsing(email in email_strategy()) {
        let parsed = Command::try_from(format!("RCPT TO:<{email}>").as_str());
        prop_assert_eq!(parsed, Ok(Command::RcptTo(email)));
    }

    #[test]
    fn senders_survive_parsing(email in email_strategy(), size in 1..100_000_usize) {
        let parsed = Command::try_from(format!("MAIL FROM:<{email}> SIZE={size}").as_str());

        let Ok(Command::MailFrom(sender, params)) = parsed else {
            return Err(TestCaseError::fail("expected MAIL FROM"));
        };
        prop_assert_eq!(sender, email);
        prop_assert_eq!(params.size(), Some(size));
    }

    #[test]
    fn case_insensitive_keywords(cmd in simple_command_strategy()) {
        let mixed = cmd
            .chars()
            .enumerate()
            .map(|(i, c)| if i % 2 == 0 { c.to_ascii_lowercase() } else { c })
            .collect::<String>();

        let upper = Command::try_from(cmd.as_str());
        let lower = Command::try_from(cmd.to_lowercase().as_str());
        let mixed = Command::try_from(mixed.as_str());

        prop_assert!(upper.is_ok());
        prop_assert_eq!(&upper, &lower);
        prop_assert_eq!(&upper, &mixed);
    }

    #[test]
    fn surrounding_whitespace_is_ignored(cmd in command_strategy()) {
        prop_assert_eq!(
            Command::try_from(format!("  {cmd}\r\n").as_str()),
            Command::try_from(cmd.as_str())
        );
        prop_assert!(Command::try_from(cmd.as_str()).is_ok(), "Failed to parse: {}", cmd);
    }

    #[test]
    fn display_round_trips(cmd in command_strategy()) {
        #[allow(clippy::unwrap_used, reason = "generated commands are valid")]
        let parsed = Command::try_from(cmd.as_str()).unwrap();
        prop_assert_eq!(Command::try_from(parsed.to_string()), Ok(parsed));
    }

    #[test]
    fn arbitrary_input_does_not_panic(line in "\\PC{0,64}") {
        let _ = Command::try_from(line.as_str());
    }
}
