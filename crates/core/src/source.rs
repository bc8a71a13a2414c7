//! Rate source identifiers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upstream institution that publishes a USD/GTQ buy rate.
///
/// The set is closed: adding a source means adding a fetcher for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Banco de Guatemala, official reference rate (SOAP).
    Banguat,
    /// Banrural, virtual banking buy rate (JSON API, HTML fallback).
    Banrural,
    /// Nexa Banco, public website buy rate (HTML).
    Nexa,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown rate source: {0}")]
pub struct UnknownSource(pub String);

impl Source {
    /// Every registered source, in key order.
    pub const ALL: [Source; 3] = [Source::Banguat, Source::Banrural, Source::Nexa];

    /// Stable short key used in logs, storage and configuration.
    pub fn key(self) -> &'static str {
        match self {
            Source::Banguat => "banguat",
            Source::Banrural => "banrural",
            Source::Nexa => "nexa",
        }
    }

    /// Institution name as stored in the rate archive.
    pub fn institution_name(self) -> &'static str {
        match self {
            Source::Banguat => "Banco de Guatemala",
            Source::Banrural => "Banrural",
            Source::Nexa => "Nexa Banco",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|source| source.key().eq_ignore_ascii_case(key.trim()))
    }
}

// Ordering follows the lexical order of the keys so ranking tie-breaks
// never depend on declaration order.
impl Ord for Source {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(other.key())
    }
}

impl PartialOrd for Source {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| UnknownSource(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_keys() {
        assert_eq!(Source::Banguat.key(), "banguat");
        assert_eq!(Source::Banrural.key(), "banrural");
        assert_eq!(Source::Nexa.key(), "nexa");
    }

    #[test]
    fn test_source_from_key() {
        assert_eq!(Source::from_key("banguat"), Some(Source::Banguat));
        assert_eq!(Source::from_key(" NEXA "), Some(Source::Nexa));
        assert_eq!(Source::from_key("bi"), None);
        assert!("unknown".parse::<Source>().is_err());
        assert_eq!("Banrural".parse::<Source>(), Ok(Source::Banrural));
    }

    #[test]
    fn test_source_ordering_is_lexical() {
        let mut sources = vec![Source::Nexa, Source::Banrural, Source::Banguat];
        sources.sort();
        assert_eq!(sources, vec![Source::Banguat, Source::Banrural, Source::Nexa]);
        assert_eq!(Source::ALL.to_vec(), sources);
    }

    #[test]
    fn test_source_serde_uses_key() {
        let json = serde_json::to_string(&Source::Banrural).unwrap();
        assert_eq!(json, "\"banrural\"");
        let parsed: Source = serde_json::from_str("\"nexa\"").unwrap();
        assert_eq!(parsed, Source::Nexa);
    }
}
