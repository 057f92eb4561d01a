//! Core data types for the ingestion pipeline.
//!
//! A [`PriceRecord`] is one observed spot price sample. Records are created
//! by the price fetcher from raw API pages and are immutable afterwards;
//! the aggregator and the persistence workers only ever read them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical timestamp form used in persistence keys.
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical timestamp form used in file naming and artifacts.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One observed spot price sample.
///
/// Invariants (checked at construction): `availability_zone` begins with
/// `region`, and `price` is a non-negative decimal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PriceRecord {
    /// AWS region code, e.g. `us-east-1`.
    pub region: String,
    /// Availability zone the price was observed in, e.g. `us-east-1a`.
    pub availability_zone: String,
    /// EC2 instance type, e.g. `t2.micro`.
    pub instance_type: String,
    /// Product description, e.g. `Linux/UNIX`.
    pub product_description: String,
    /// Observed spot price. String-encoded on the wire to avoid float drift.
    #[serde(rename = "SpotPrice")]
    pub price: Decimal,
    /// Observation time, UTC.
    #[serde(with = "utc_second")]
    pub timestamp: DateTime<Utc>,
}

/// Violation of a [`PriceRecord`] construction invariant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecordError {
    /// Availability zone does not begin with the record's region.
    #[error("availability zone '{availability_zone}' does not belong to region '{region}'")]
    ZoneOutsideRegion {
        /// Claimed region.
        region: String,
        /// Offending availability zone.
        availability_zone: String,
    },

    /// Price is negative.
    #[error("negative spot price {price} for {instance_type}")]
    NegativePrice {
        /// Offending price.
        price: Decimal,
        /// Instance type the price was reported for.
        instance_type: String,
    },
}

impl PriceRecord {
    /// Create a record, enforcing the data-shape invariants.
    pub fn new(
        region: impl Into<String>,
        availability_zone: impl Into<String>,
        instance_type: impl Into<String>,
        product_description: impl Into<String>,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let region = region.into();
        let availability_zone = availability_zone.into();
        let instance_type = instance_type.into();

        if !availability_zone.starts_with(&region) {
            return Err(RecordError::ZoneOutsideRegion {
                region,
                availability_zone,
            });
        }
        if price.is_sign_negative() && !price.is_zero() {
            return Err(RecordError::NegativePrice {
                price,
                instance_type,
            });
        }

        Ok(Self {
            region,
            availability_zone,
            instance_type,
            product_description: product_description.into(),
            price,
            timestamp,
        })
    }

    /// Composite natural key used for upsert targeting in the durable store.
    ///
    /// No two distinct records share a key, so concurrent workers never
    /// contend for a partial update of another worker's row.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.availability_zone,
            self.timestamp.format(KEY_TIMESTAMP_FORMAT),
            self.instance_type,
            self.product_description
        )
    }
}

/// Per-instance-type price summary, recomputed each pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceTypeSummary {
    /// EC2 instance type.
    pub instance_type: String,
    /// Arithmetic mean of all observed prices for this type.
    pub avg_price: Decimal,
}

/// Serde helpers rendering UTC timestamps as `%Y-%m-%dT%H:%M:%SZ` strings.
pub mod utc_second {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::FILE_TIMESTAMP_FORMAT;

    /// Serialize a timestamp in the canonical second-resolution form.
    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&dt.format(FILE_TIMESTAMP_FORMAT).to_string())
    }

    /// Deserialize a timestamp from the canonical second-resolution form.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        NaiveDateTime::parse_from_str(&raw, FILE_TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).single().unwrap()
    }

    fn record() -> PriceRecord {
        PriceRecord::new(
            "us-east-1",
            "us-east-1a",
            "t2.micro",
            "Linux/UNIX",
            Decimal::new(35, 4),
            ts(),
        )
        .unwrap()
    }

    #[test]
    fn zone_must_begin_with_region() {
        let result = PriceRecord::new(
            "us-west-2",
            "us-east-1a",
            "t2.micro",
            "Linux/UNIX",
            Decimal::ONE,
            ts(),
        );
        assert!(matches!(result, Err(RecordError::ZoneOutsideRegion { .. })));
    }

    #[test]
    fn negative_price_rejected() {
        let result = PriceRecord::new(
            "us-east-1",
            "us-east-1a",
            "t2.micro",
            "Linux/UNIX",
            Decimal::new(-1, 2),
            ts(),
        );
        assert!(matches!(result, Err(RecordError::NegativePrice { .. })));
    }

    #[test]
    fn zero_price_allowed() {
        let result = PriceRecord::new(
            "us-east-1",
            "us-east-1a",
            "t2.micro",
            "Linux/UNIX",
            Decimal::ZERO,
            ts(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn composite_key_uses_standard_timestamp_form() {
        assert_eq!(record().key(), "us-east-1a|2024-01-01 12:30:00|t2.micro|Linux/UNIX");
    }

    #[test]
    fn serialized_record_is_schema_stable() {
        let json = serde_json::to_string(&record()).unwrap();
        // Field order preserved; price and timestamp rendered as strings.
        let expected = concat!(
            r#"{"Region":"us-east-1","AvailabilityZone":"us-east-1a","#,
            r#""InstanceType":"t2.micro","ProductDescription":"Linux/UNIX","#,
            r#""SpotPrice":"0.0035","Timestamp":"2024-01-01T12:30:00Z"}"#
        );
        assert_eq!(json, expected);
    }

    #[test]
    fn record_round_trips_through_json() {
        let original = record();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: PriceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
