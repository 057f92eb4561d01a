//! Availability-zone to region reverse lookup.
//!
//! The region catalog is fetched once before the worker pool starts and
//! shared read-only across workers. The cache lives for a single pipeline
//! run, never for the process lifetime.

use serde::{Deserialize, Serialize};

/// A record's availability zone matched no configured region.
///
/// Non-fatal: the offending record is skipped with a logged warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("availability zone '{availability_zone}' matches no configured region")]
pub struct RegionLookupError {
    /// The zone that could not be mapped.
    pub availability_zone: String,
}

/// Read-only region catalog with prefix-based zone lookup.
///
/// Constructed once per pipeline run; never mutated after pool start.
#[derive(Debug, Clone)]
pub struct RegionMap {
    regions: Vec<String>,
}

impl RegionMap {
    /// Build a catalog from region codes.
    ///
    /// Longer codes are tried first so `us-east-1a` resolves to
    /// `us-east-1` even when a shorter prefix region is also present.
    #[must_use]
    pub fn new(mut regions: Vec<String>) -> Self {
        regions.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        regions.dedup();
        Self { regions }
    }

    /// Number of known regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Map an availability zone to its owning region.
    pub fn assign_region(&self, availability_zone: &str) -> Result<&str, RegionLookupError> {
        self.regions
            .iter()
            .find(|r| availability_zone.starts_with(r.as_str()))
            .map(String::as_str)
            .ok_or_else(|| RegionLookupError {
                availability_zone: availability_zone.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> RegionMap {
        RegionMap::new(vec![
            "us-east-1".to_string(),
            "us-east-2".to_string(),
            "eu-west-1".to_string(),
        ])
    }

    #[test]
    fn zone_resolves_to_owning_region() {
        assert_eq!(map().assign_region("us-east-1a").unwrap(), "us-east-1");
        assert_eq!(map().assign_region("eu-west-1c").unwrap(), "eu-west-1");
    }

    #[test]
    fn unknown_zone_is_a_lookup_error() {
        let err = map().assign_region("ap-south-1b").unwrap_err();
        assert_eq!(err.availability_zone, "ap-south-1b");
    }

    #[test]
    fn longest_prefix_wins() {
        // A hypothetical shorter code must not shadow the real region.
        let map = RegionMap::new(vec!["us-east".to_string(), "us-east-1".to_string()]);
        assert_eq!(map.assign_region("us-east-1a").unwrap(), "us-east-1");
    }

    #[test]
    fn duplicates_are_collapsed() {
        let map = RegionMap::new(vec!["us-east-1".to_string(), "us-east-1".to_string()]);
        assert_eq!(map.len(), 1);
    }
}
