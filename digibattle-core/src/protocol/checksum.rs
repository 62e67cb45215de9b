//! Trailing checksum nibble used by 20th-anniversary battle messages.
//!
//! A message is ten 4-digit hex fields. The first digit of the last field
//! is the checksum slot; it is chosen so that every digit of the message,
//! checksum included, sums to a multiple of 16.

use crate::models::error::ModemError;

pub const MESSAGE_FIELDS: usize = 10;
pub const FIELD_LEN: usize = 4;

fn nibble(c: char) -> Result<u32, ModemError> {
    c.to_digit(16)
        .ok_or_else(|| ModemError::InvalidArgument(format!("not a hex digit: {:?}", c)))
}

fn check_shape<S: AsRef<str>>(messages: &[S]) -> Result<(), ModemError> {
    if messages.len() != MESSAGE_FIELDS {
        return Err(ModemError::InvalidArgument(format!(
            "checksum needs {} fields, got {}",
            MESSAGE_FIELDS,
            messages.len()
        )));
    }
    if let Some(bad) = messages.iter().map(AsRef::as_ref).find(|m| m.chars().count() != FIELD_LEN) {
        return Err(ModemError::InvalidArgument(format!("field {:?} is not {} hex digits", bad, FIELD_LEN)));
    }
    Ok(())
}

/// Sum of every digit the checksum covers; the checksum slot itself is skipped.
fn covered_sum<S: AsRef<str>>(messages: &[S]) -> Result<u32, ModemError> {
    check_shape(messages)?;
    let mut total = 0;
    for (index, message) in messages.iter().enumerate() {
        let skip = if index == MESSAGE_FIELDS - 1 { 1 } else { 0 };
        for c in message.as_ref().chars().skip(skip) {
            total += nibble(c)?;
        }
    }
    Ok(total)
}

/// Checksum digit for a ten-field message, as a lowercase hex char.
pub fn checksum_nibble<S: AsRef<str>>(messages: &[S]) -> Result<char, ModemError> {
    let total = covered_sum(messages)?;
    let digit = (16 - total % 16) % 16;
    std::char::from_digit(digit, 16)
        .ok_or_else(|| ModemError::InvalidArgument(format!("checksum digit out of range: {}", digit)))
}

/// Write the checksum digit into slot 0 of the last field.
pub fn apply_checksum(messages: &mut [String]) -> Result<(), ModemError> {
    let checksum = checksum_nibble(messages)?;
    let last = &mut messages[MESSAGE_FIELDS - 1];
    let rest: String = last.chars().skip(1).collect();
    *last = format!("{}{}", checksum, rest);
    Ok(())
}

/// Whether every digit of the message, checksum included, sums to 0 mod 16.
pub fn verify_checksum<S: AsRef<str>>(messages: &[S]) -> bool {
    let Ok(total) = covered_sum(messages) else {
        return false;
    };
    let Some(slot) = messages[MESSAGE_FIELDS - 1].as_ref().chars().next().and_then(|c| c.to_digit(16)) else {
        return false;
    };
    (total + slot) % 16 == 0
}
