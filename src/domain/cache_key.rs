//! Structured keys for the per-ad aggregate records in the cache.
//!
//! Two hash records exist per ad: the counter record `ad-<id>` and the stats
//! record `time-<id>`. Keys are always built and parsed through
//! [`AggregateKey`] so the ad id never has to be recovered by slicing a
//! string at a fixed offset.

use std::fmt;
use std::str::FromStr;

/// Which of the two per-ad records a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTag {
    /// `ad-<id>`: field `clicks`.
    Counter,
    /// `time-<id>`: fields `impression`, `timeframe`, `playbacktime`.
    Stats,
}

impl KeyTag {
    pub const fn prefix(self) -> &'static str {
        match self {
            KeyTag::Counter => "ad",
            KeyTag::Stats => "time",
        }
    }

    /// Glob pattern matching every key carrying this tag.
    pub fn scan_pattern(self) -> String {
        format!("{}-*", self.prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub tag: KeyTag,
    pub ad_id: i64,
}

impl AggregateKey {
    pub const fn counter(ad_id: i64) -> Self {
        Self {
            tag: KeyTag::Counter,
            ad_id,
        }
    }

    pub const fn stats(ad_id: i64) -> Self {
        Self {
            tag: KeyTag::Stats,
            ad_id,
        }
    }

    /// The record paired with this one for the same ad.
    pub const fn sibling(self) -> Self {
        match self.tag {
            KeyTag::Counter => Self::stats(self.ad_id),
            KeyTag::Stats => Self::counter(self.ad_id),
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tag.prefix(), self.ad_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an aggregate key: {0:?}")]
pub struct InvalidKey(pub String);

impl FromStr for AggregateKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidKey(s.to_string());

        let (prefix, id) = s.split_once('-').ok_or_else(invalid)?;
        let tag = match prefix {
            "ad" => KeyTag::Counter,
            "time" => KeyTag::Stats,
            _ => return Err(invalid()),
        };

        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let ad_id: i64 = id.parse().map_err(|_| invalid())?;
        if ad_id <= 0 {
            return Err(invalid());
        }

        Ok(Self { tag, ad_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(AggregateKey::counter(42).to_string(), "ad-42");
        assert_eq!(AggregateKey::stats(42).to_string(), "time-42");
        assert_eq!(KeyTag::Counter.scan_pattern(), "ad-*");
    }

    #[test]
    fn test_parse_roundtrip() {
        let key: AggregateKey = "ad-1234".parse().unwrap();
        assert_eq!(key, AggregateKey::counter(1234));
        assert_eq!(key.sibling(), AggregateKey::stats(1234));

        let key: AggregateKey = "time-9".parse().unwrap();
        assert_eq!(key.tag, KeyTag::Stats);
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        for raw in ["ad-", "ad-abc", "ad--3", "ad-0", "ads-1", "ad-1-2", "session:ad-1", "ad+1"] {
            assert!(raw.parse::<AggregateKey>().is_err(), "{raw} should not parse");
        }
    }
}
