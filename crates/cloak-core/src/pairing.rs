//! Pairing codes.
//!
//! Pairing is local only. The joining device stores whatever well-formed
//! code it is given as its partner id; nothing checks it against a peer and
//! nothing guarantees codes are unique across devices.

use rand::rngs::OsRng;
use rand::Rng;

use crate::error::{CloakError, Result};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Shortest code that can be generated or joined, whatever the settings say.
pub const MIN_CODE_LEN: usize = 6;

pub fn generate_code(len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[OsRng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Returns the normalized code, or `InvalidInput` when it is shorter than
/// [`MIN_CODE_LEN`] characters. Content is not checked.
pub fn validate_join_code(input: &str) -> Result<String> {
    let code = normalize_code(input);
    if code.chars().count() < MIN_CODE_LEN {
        return Err(CloakError::InvalidInput(format!(
            "pairing code must be at least {MIN_CODE_LEN} characters"
        )));
    }
    Ok(code)
}
