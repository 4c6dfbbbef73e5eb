// crates/core/src/language.rs
//! Narration languages supported by the video generator.
//!
//! The generator binary presents a numeric language menu on stdin; each
//! supported language maps to the menu code fed as the first input line.
//! Unknown tags are rejected at the API boundary; there is no silent
//! fallback to a default language.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

/// A supported narration language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Hi,
    Ta,
}

/// All supported languages, in menu order.
pub const SUPPORTED_LANGUAGES: [Language; 3] = [Language::En, Language::Hi, Language::Ta];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported language tag: {0} (expected one of: en, hi, ta)")]
pub struct UnknownLanguage(pub String);

impl Language {
    /// The numeric menu code the generator expects as its first stdin line.
    pub fn menu_code(&self) -> &'static str {
        match self {
            Language::En => "1",
            Language::Hi => "2",
            Language::Ta => "3",
        }
    }

    /// The BCP 47-style tag used on the wire.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Ta => "ta",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "hi" => Ok(Language::Hi),
            "ta" => Ok(Language::Ta),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}
