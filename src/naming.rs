//! Specimen, sample and site naming conventions.

use crate::error::{MagicError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a parent name is derived from a child name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRule {
    /// Parent name equals the child name
    #[default]
    Same,
    /// Drop a fixed number of trailing characters
    TrimTrailing(usize),
    /// Drop the last component after splitting on a delimiter
    Delimited(String),
}

impl NameRule {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameRule::Same => name.to_string(),
            NameRule::TrimTrailing(count) => trim_trailing(name, *count),
            NameRule::Delimited(delimiter) => drop_last_component(name, delimiter),
        }
    }
}

impl fmt::Display for NameRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameRule::Same => write!(f, "same"),
            NameRule::TrimTrailing(count) => write!(f, "drop {} trailing characters", count),
            NameRule::Delimited(delimiter) => write!(f, "delimited by '{}'", delimiter),
        }
    }
}

/// Names too short to trim are kept whole
fn trim_trailing(name: &str, count: usize) -> String {
    let length = name.chars().count();
    if count == 0 || count >= length {
        return name.to_string();
    }
    name.chars().take(length - count).collect()
}

fn drop_last_component(name: &str, delimiter: &str) -> String {
    if delimiter.is_empty() {
        return name.to_string();
    }
    match name.rsplit_once(delimiter) {
        Some((parent, _)) => parent.to_string(),
        None => name.to_string(),
    }
}

/// Numbered sample → site conventions used by the SQUID converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteConvention {
    /// `[1]` XXXXY: single trailing sample character
    TrailingCharacter,
    /// `[2]` XXXX-YY
    Hyphen,
    /// `[3]` XXXX.YY
    Dot,
    /// `[4-Z]` XXXX\[YYY\]: Z trailing sample characters
    TrailingCharacters(usize),
    /// `[5]` site name equals sample name
    SameAsSample,
    /// `[7-Z]` \[XXX\]YYY: site is the first Z characters
    LeadingCharacters(usize),
}

impl SiteConvention {
    pub fn site_for(&self, sample: &str) -> String {
        match self {
            SiteConvention::TrailingCharacter => trim_trailing(sample, 1),
            SiteConvention::Hyphen => drop_last_component(sample, "-"),
            SiteConvention::Dot => drop_last_component(sample, "."),
            SiteConvention::TrailingCharacters(count) => trim_trailing(sample, *count),
            SiteConvention::SameAsSample => sample.to_string(),
            SiteConvention::LeadingCharacters(count) => sample.chars().take(*count).collect(),
        }
    }
}

impl FromStr for SiteConvention {
    type Err = MagicError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (code, count) = match value.split_once('-') {
            Some((code, count)) => (code, Some(count)),
            None => (value, None),
        };
        let parse_count = || -> Result<usize> {
            let raw = count.ok_or_else(|| {
                MagicError::invalid_argument("--ncn", value, "expected a character count, as in 4-2")
            })?;
            raw.parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    MagicError::invalid_argument("--ncn", value, "character count must be a positive integer")
                })
        };

        match code {
            "1" => Ok(SiteConvention::TrailingCharacter),
            "2" => Ok(SiteConvention::Hyphen),
            "3" => Ok(SiteConvention::Dot),
            "4" => Ok(SiteConvention::TrailingCharacters(parse_count()?)),
            "5" => Ok(SiteConvention::SameAsSample),
            "6" => Err(MagicError::invalid_argument(
                "--ncn",
                value,
                "convention 6 (site name from an orient file) is not supported",
            )),
            "7" => Ok(SiteConvention::LeadingCharacters(parse_count()?)),
            _ => Err(MagicError::invalid_argument(
                "--ncn",
                value,
                "expected one of 1, 2, 3, 4-Z, 5, 7-Z",
            )),
        }
    }
}

impl fmt::Display for SiteConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteConvention::TrailingCharacter => write!(f, "1"),
            SiteConvention::Hyphen => write!(f, "2"),
            SiteConvention::Dot => write!(f, "3"),
            SiteConvention::TrailingCharacters(count) => write!(f, "4-{}", count),
            SiteConvention::SameAsSample => write!(f, "5"),
            SiteConvention::LeadingCharacters(count) => write!(f, "7-{}", count),
        }
    }
}
