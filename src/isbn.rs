//! ISBN-10 / ISBN-13 checksum validation

use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsbnError {
    #[error("Invalid ISBN format: {0}")]
    InvalidFormat(String),
}

impl From<IsbnError> for AppError {
    fn from(err: IsbnError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Strip hyphens and whitespace, upper-case a trailing `x`.
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validate a raw ISBN and return its normalized form.
pub fn validate_isbn(raw: &str) -> Result<String, IsbnError> {
    let isbn = normalize_isbn(raw);
    let valid = match isbn.len() {
        10 => is_valid_isbn10(&isbn),
        13 => is_valid_isbn13(&isbn),
        _ => false,
    };

    if valid {
        Ok(isbn)
    } else {
        Err(IsbnError::InvalidFormat(raw.to_string()))
    }
}

/// Nine digits followed by a digit or `X`; weighted sum 10..1 must be divisible by 11.
pub fn is_valid_isbn10(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 10 {
        return false;
    }

    let mut sum = 0u32;
    for (i, b) in bytes.iter().enumerate() {
        let value = match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'X' if i == 9 => 10,
            _ => return false,
        };
        sum += (10 - i as u32) * value;
    }

    sum % 11 == 0
}

/// Thirteen digits; alternating 1/3 weights over the first twelve give the check digit.
pub fn is_valid_isbn13(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let sum: u32 = bytes[..12]
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 0 {
                d
            } else {
                d * 3
            }
        })
        .sum();

    let check = (10 - sum % 10) % 10;
    check == u32::from(bytes[12] - b'0')
}
