//! Instance-type aggregation over fetched price records.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::model::{InstanceTypeSummary, PriceRecord};

/// Aggregated view of one pipeline run's records.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Distinct instance types, sorted ascending.
    pub unique_instance_types: Vec<String>,
    /// Per-type average price, in the same order as the types.
    pub summaries: Vec<InstanceTypeSummary>,
}

/// A price group was unexpectedly empty.
///
/// Defensive: cannot occur for groups built from observed records. When it
/// does, the type is omitted from the summaries rather than failing the run.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no price samples for instance type '{instance_type}'")]
pub struct EmptyGroupError {
    /// The instance type with no samples.
    pub instance_type: String,
}

/// Compute the unique instance-type set and per-type average prices.
///
/// Types are sorted lexicographically. Averages are exact decimal
/// arithmetic means over every record sharing the type.
#[must_use]
pub fn aggregate(records: &[PriceRecord]) -> Aggregation {
    let mut groups: BTreeMap<&str, Vec<Decimal>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.instance_type.as_str())
            .or_default()
            .push(record.price);
    }

    let unique_instance_types: Vec<String> = groups.keys().map(ToString::to_string).collect();

    let mut summaries = Vec::with_capacity(groups.len());
    for (instance_type, prices) in &groups {
        match mean(instance_type, prices) {
            Ok(avg_price) => summaries.push(InstanceTypeSummary {
                instance_type: (*instance_type).to_string(),
                avg_price,
            }),
            Err(e) => warn!(error = %e, "omitting empty price group"),
        }
    }

    Aggregation {
        unique_instance_types,
        summaries,
    }
}

fn mean(instance_type: &str, prices: &[Decimal]) -> Result<Decimal, EmptyGroupError> {
    if prices.is_empty() {
        return Err(EmptyGroupError {
            instance_type: instance_type.to_string(),
        });
    }
    let sum: Decimal = prices.iter().copied().sum();
    Ok(sum / Decimal::from(prices.len()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;

    fn record(instance_type: &str, price: &str) -> PriceRecord {
        PriceRecord::new(
            "us-east-1",
            "us-east-1a",
            instance_type,
            "Linux/UNIX",
            price.parse().unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn average_is_exact_decimal_mean() {
        let records = vec![
            record("t2.micro", "0.01"),
            record("t2.micro", "0.02"),
            record("t2.micro", "0.03"),
        ];
        let agg = aggregate(&records);

        assert_eq!(agg.unique_instance_types, vec!["t2.micro"]);
        assert_eq!(agg.summaries.len(), 1);
        assert_eq!(agg.summaries[0].avg_price, "0.02".parse::<Decimal>().unwrap());
    }

    #[test]
    fn types_are_sorted_lexicographically() {
        let records = vec![
            record("m5.large", "0.10"),
            record("c5.xlarge", "0.20"),
            record("t2.micro", "0.01"),
            record("c5.xlarge", "0.22"),
        ];
        let agg = aggregate(&records);

        assert_eq!(
            agg.unique_instance_types,
            vec!["c5.xlarge", "m5.large", "t2.micro"]
        );
        assert_eq!(agg.summaries[0].instance_type, "c5.xlarge");
        assert_eq!(agg.summaries[0].avg_price, "0.21".parse::<Decimal>().unwrap());
    }

    #[test]
    fn empty_input_aggregates_to_nothing() {
        let agg = aggregate(&[]);
        assert!(agg.unique_instance_types.is_empty());
        assert!(agg.summaries.is_empty());
    }

    #[test]
    fn empty_group_is_an_error() {
        assert!(mean("t2.micro", &[]).is_err());
    }
}
