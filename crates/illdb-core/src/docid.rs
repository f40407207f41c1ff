//! Document identifiers and the shard hash.
//!
//! A document id is `namespace:type:key`, optionally followed by more
//! colon-separated segments that routing ignores. The shard hash is always
//! taken over the full, unparsed id.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// A parsed document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId {
    raw: String,
    namespace: String,
    doc_type: String,
}

impl DocumentId {
    /// Parse `namespace:type:key[:...]`. Fewer than three segments is an error.
    /// The key itself never takes part in routing.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(doc_type), Some(_key)) => Ok(Self {
                raw: raw.to_string(),
                namespace: namespace.to_string(),
                doc_type: doc_type.to_string(),
            }),
            _ => Err(CoreError::InvalidIdentifier(raw.to_string())),
        }
    }

    /// The identifier exactly as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Namespace segment as written (before wildcard/bucket redirection).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Name of the per-type data table holding this document.
    pub fn table_name(&self) -> String {
        format!("data_{}", self.doc_type)
    }

    /// CRC-32 (IEEE) over the raw identifier bytes.
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(self.raw.as_bytes())
    }

    /// Shard index in `[0, numshards)`.
    ///
    /// Existing writers treat the checksum as a signed 32-bit integer and
    /// take the floored modulo, so this does the same. For power-of-two
    /// shard counts it coincides with the unsigned remainder.
    pub fn shard_index(&self, numshards: NonZeroU32) -> u32 {
        let signed = i64::from(self.checksum() as i32);
        signed.rem_euclid(i64::from(numshards.get())) as u32
    }
}

impl FromStr for DocumentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn parse_three_segments() {
        let id = DocumentId::parse("148:account:455b87ae").unwrap();
        assert_eq!(id.namespace(), "148");
        assert_eq!(id.doc_type(), "account");
        assert_eq!(id.table_name(), "data_account");
    }

    #[test]
    fn parse_ignores_trailing_segments() {
        let id = DocumentId::parse("eu:profile:42:v2:extra").unwrap();
        assert_eq!(id.namespace(), "eu");
        assert_eq!(id.doc_type(), "profile");
        assert_eq!(id.as_str(), "eu:profile:42:v2:extra");
    }

    #[test]
    fn parse_allows_empty_segments() {
        let id = DocumentId::parse("::").unwrap();
        assert_eq!(id.namespace(), "");
        assert_eq!(id.table_name(), "data_");
    }

    #[test]
    fn parse_rejects_short_ids() {
        for raw in ["", "global", "global:account"] {
            let err = DocumentId::parse(raw).unwrap_err();
            assert!(matches!(err, CoreError::InvalidIdentifier(ref s) if s == raw));
        }
    }

    #[test]
    fn from_str_and_display() {
        let id: DocumentId = "*:account:abc123".parse().unwrap();
        assert_eq!(id.to_string(), "*:account:abc123");
    }

    #[test]
    fn checksum_matches_reference_crc32() {
        let id = DocumentId::parse("*:account:abc123").unwrap();
        assert_eq!(id.checksum(), 1_151_089_001);
        assert_eq!(id.shard_index(shards(4)), 1);
    }

    #[test]
    fn shard_index_uses_signed_checksum() {
        // crc32 = 3249339324, i.e. -1045627972 as i32.
        let id = DocumentId::parse("global:session:x9").unwrap();
        assert_eq!(id.checksum(), 3_249_339_324);
        assert_eq!(id.shard_index(shards(7)), 3);
        assert_eq!(id.shard_index(shards(3)), 2);
        // Power-of-two counts agree with the unsigned remainder.
        assert_eq!(id.shard_index(shards(64)), 3_249_339_324 % 64);
    }

    #[test]
    fn shard_index_known_layout() {
        let id = DocumentId::parse("148:account:455b87ae-4c8c-11e5-91a2-08002754a170").unwrap();
        assert_eq!(id.shard_index(shards(64)), 51);
    }

    #[test]
    fn shard_index_stable_and_in_range() {
        let id = DocumentId::parse("eu:profile:43").unwrap();
        for n in 1..=97 {
            let first = id.shard_index(shards(n));
            assert!(first < n);
            assert_eq!(first, id.shard_index(shards(n)));
        }
        assert_eq!(id.shard_index(shards(1)), 0);
    }
}
