//! Throwaway identities for seed data.
//!
//! Names combine random words with a process-wide sequence number, so two
//! calls in the same process never return the same username or email.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "dusty", "eager", "fuzzy", "gentle", "hazy", "icy", "jolly",
    "keen", "lucky", "mellow", "nimble", "odd", "proud", "quiet", "rapid", "sunny", "tidy",
];

const NOUNS: &[&str] = &[
    "otter", "falcon", "maple", "cedar", "badger", "comet", "harbor", "lynx", "meadow", "pebble",
    "quartz", "raven", "sparrow", "tundra", "willow", "yak", "zephyr", "heron", "orchid", "fox",
];

const DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

fn pick(words: &'static [&'static str]) -> &'static str {
    words.choose(&mut rand::thread_rng()).copied().unwrap_or("user")
}

/// Username matching `[a-z0-9_]{3,50}`, unique within the process.
pub fn user_name() -> String {
    let n = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}{}", pick(ADJECTIVES), pick(NOUNS), n)
}

/// Lowercase email address, unique within the process.
pub fn email() -> String {
    format!("{}@{}", user_name().replace('_', "."), pick(DOMAINS))
}

pub fn password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::{is_valid_email, is_valid_username};
    use std::collections::HashSet;

    #[test]
    fn generated_identities_pass_validation() {
        for _ in 0..20 {
            assert!(is_valid_username(&user_name()));
            assert!(is_valid_email(&email()));
        }
    }

    #[test]
    fn identities_do_not_repeat() {
        let names: HashSet<_> = (0..500).map(|_| user_name()).collect();
        assert_eq!(names.len(), 500);
        let emails: HashSet<_> = (0..500).map(|_| email()).collect();
        assert_eq!(emails.len(), 500);
    }

    #[test]
    fn passwords_are_long_enough_to_register() {
        assert!(password().len() >= crate::auth::services::MIN_PASSWORD_LEN);
    }
}
