//! Tracking numbers: `PMS-` followed by 8 upper-case hex digits.
//!
//! Numbers are random, not sequential. Uniqueness is the store's job; callers
//! retry with a fresh number on conflict.

use uuid::Uuid;

pub const TRACKING_PREFIX: &str = "PMS-";

const SUFFIX_LEN: usize = 8;

pub fn generate_tracking_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{TRACKING_PREFIX}{}", hex[..SUFFIX_LEN].to_uppercase())
}

/// Shape check used to short-circuit public lookups.
pub fn is_tracking_number(s: &str) -> bool {
    match s.strip_prefix(TRACKING_PREFIX) {
        Some(rest) => {
            rest.len() == SUFFIX_LEN
                && rest.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        }
        None => false,
    }
}
