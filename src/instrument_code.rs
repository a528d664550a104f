use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between the symbol and the exchange suffix of a code
/// (e.g. `000001.SZ`).
pub const EXCHANGE_SEPARATOR: char = '.';

/// Stable identifier of a listed equity (e.g. "000001.SZ", "600519.SH").
///
/// Codes are compared byte-for-byte; no case folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentCode(String);

impl InstrumentCode {
    /// Creates a code after validating it.
    ///
    /// # Errors
    /// Returns an error if the code is empty or contains characters other
    /// than ASCII alphanumerics, dots, hyphens and underscores.
    pub fn new(code: impl Into<String>) -> Result<Self, InstrumentCodeError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(InstrumentCode(code))
    }

    fn validate(code: &str) -> Result<(), InstrumentCodeError> {
        if code.is_empty() {
            return Err(InstrumentCodeError::EmptyCode);
        }

        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == EXCHANGE_SEPARATOR || c == '-' || c == '_')
        {
            return Err(InstrumentCodeError::InvalidCharacters(code.to_string()));
        }

        Ok(())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `true` when a watchlist token should be treated as a code rather
/// than a display name. Codes always carry an exchange suffix.
pub fn is_code_token(token: &str) -> bool {
    token.contains(EXCHANGE_SEPARATOR)
}

impl fmt::Display for InstrumentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InstrumentCode {
    type Error = InstrumentCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        InstrumentCode::new(value)
    }
}

impl From<InstrumentCode> for String {
    fn from(code: InstrumentCode) -> Self {
        code.0
    }
}

/// Errors that can occur when creating instrument codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstrumentCodeError {
    #[error("Instrument code cannot be empty")]
    EmptyCode,
    #[error("Instrument code '{0}' contains invalid characters")]
    InvalidCharacters(String),
}
