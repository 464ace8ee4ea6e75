//! Document identifiers with an embedded recency bound.
//!
//! An identifier has the form `<10 alphanumeric characters>-<hex bound>`, where the bound is
//! `floor(epoch_millis * π)` at generation time, written in lowercase hexadecimal. Validation
//! checks the shape and requires the bound not to lie in the future of the validating clock,
//! so an identifier stays valid forever under a non-decreasing clock but is rejected if the
//! clock has gone backwards since it was generated.
//!
//! # Collisions
//!
//! The random part is drawn uniformly from 62 symbols, giving 62^10 combinations per bound.
//! Nothing checks a new identifier against the documents already stored; two documents created
//! in the same millisecond could in principle share an identifier. This is an accepted
//! weakness of the scheme, which is a validity window rather than a collision-resistant id.

use std::f64::consts::PI;

use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};

/// Length of the random prefix.
pub const RANDOM_PART_LEN: usize = 10;

/// Generates a fresh identifier bound to the current wall clock.
pub fn generate() -> String {
    generate_at(now_millis())
}

/// Generates an identifier bound to the given epoch milliseconds.
pub fn generate_at(epoch_millis: i64) -> String {
    let random = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_PART_LEN)
        .map(char::from)
        .collect::<String>();

    format!("{}-{:x}", random, bound_at(epoch_millis))
}

/// Checks an identifier against the current wall clock.
pub fn validate(id: &str) -> bool {
    validate_at(id, now_millis())
}

/// Checks an identifier against the given epoch milliseconds.
pub fn validate_at(id: &str, epoch_millis: i64) -> bool {
    let parts = id.split('-').collect::<Vec<_>>();
    let [random, bound] = parts.as_slice() else {
        return false;
    };

    if random.len() != RANDOM_PART_LEN || !random.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return false;
    }

    // from_str_radix tolerates a leading '+', the identifier format does not.
    if bound.is_empty() || !bound.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    match u64::from_str_radix(bound, 16) {
        Ok(value) => value <= bound_at(epoch_millis),
        Err(_) => false,
    }
}

fn bound_at(epoch_millis: i64) -> u64 {
    (epoch_millis.max(0) as f64 * PI).floor() as u64
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
