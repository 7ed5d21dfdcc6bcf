//! Text encodings a connection can speak.

use serde::{Deserialize, Serialize};

use super::ConnectionError;

/// Encoding used to turn frame bytes into text and responses into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::Latin1 => "latin1",
        }
    }

    /// Parses an encoding name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Some(TextEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Some(TextEncoding::Latin1),
            _ => None,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, ConnectionError> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| ConnectionError::InvalidText { encoding: *self }),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ConnectionError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c).map_err(|_| ConnectionError::InvalidText { encoding: *self }))
                .collect(),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
