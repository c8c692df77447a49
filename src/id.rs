//! Event ID generation for analytics records.
//!
//! Sale events carry a short random ID drawn from `[0-9A-Za-z]`. At 16
//! characters that is ~95 bits of entropy, so collisions are negligible but
//! not formally excluded.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated event IDs.
pub const EVENT_ID_LEN: usize = 16;

/// Generates a fresh event ID of `EVENT_ID_LEN` alphanumeric characters.
pub fn gen_event_id() -> String {
    gen_id(EVENT_ID_LEN)
}

/// Generates a random alphanumeric ID of the given length.
pub fn gen_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Cheap format check for event IDs.
pub fn is_valid_event_id(s: &str) -> bool {
    s.len() == EVENT_ID_LEN && s.chars().all(|c| c.is_ascii_alphanumeric())
}
