//! Pipeline configuration, loaded from environment variables.
//!
//! Every recognized variable has a documented default so the scheduled
//! entry point can run with no configuration at all:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `REGION` | `eu-west-1` | Region hosting the durable table |
//! | `TARGET_REGIONS` | `us-east-1` | Comma-separated regions to fetch |
//! | `DYNAMODB_TABLE` | `MPCAWS_EC2_PRICETABLE` | Durable table name |
//! | `S3_BUCKET` | (empty) | Object store bucket; empty disables upload |
//! | `DEFAULT_DURATION` | `1` | Query duration in days |
//! | `PAGE_SIZE` | `500` | Records requested per API page |
//! | `SPOT_API_URL` | pricing endpoint | Price source base URL |
//! | `OBJECT_STORE_URL` | `https://s3.amazonaws.com` | Object store base URL |
//! | `SPOT_DB_PATH` | `spot-ingest.db` | Local path of the turso database |
//! | `POOL_SIZE` | `8` | Persistence worker count |
//! | `AWS_PROFILE` | `default` | Credential profile, recorded in the run log |

use std::time::Duration;

/// Default base URL of the price source API.
pub const DEFAULT_API_URL: &str = "https://pricing.us-east-1.amazonaws.com";

/// Default base URL of the object store.
pub const DEFAULT_OBJECT_STORE_URL: &str = "https://s3.amazonaws.com";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was present but failed validation.
    #[error("invalid value for {variable}: {reason}")]
    InvalidValue {
        /// The offending environment variable.
        variable: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Retry settings for price source page fetches.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Maximum attempts per page before the region fails.
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Exponential growth factor.
    pub multiplier: f64,
    /// Jitter factor applied to each delay (0.2 = plus or minus 20%).
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Complete pipeline settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Region hosting the durable table.
    pub region: String,
    /// Regions to fetch price data for.
    pub target_regions: Vec<String>,
    /// Durable table name.
    pub table_name: String,
    /// Object store bucket. Empty disables the object-store artifact.
    pub bucket: String,
    /// Default query duration in days.
    pub default_duration_days: i64,
    /// Records requested per API page.
    pub page_size: u32,
    /// Price source base URL.
    pub api_base_url: String,
    /// Object store base URL.
    pub object_store_url: String,
    /// Local path of the turso database file.
    pub db_path: String,
    /// Number of persistence workers.
    pub pool_size: usize,
    /// Credential profile, recorded in the run log.
    pub profile: String,
    /// Page fetch retry settings.
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: "eu-west-1".to_string(),
            target_regions: vec!["us-east-1".to_string()],
            table_name: "MPCAWS_EC2_PRICETABLE".to_string(),
            bucket: String::new(),
            default_duration_days: 1,
            page_size: 500,
            api_base_url: DEFAULT_API_URL.to_string(),
            object_store_url: DEFAULT_OBJECT_STORE_URL.to_string(),
            db_path: "spot-ingest.db".to_string(),
            pool_size: 8,
            profile: "default".to_string(),
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a present variable fails validation
    /// (zero pool size or page size).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let target_regions = std::env::var("TARGET_REGIONS")
            .map(|raw| parse_region_list(&raw))
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.target_regions);

        let page_size = parse_env_u32("PAGE_SIZE", defaults.page_size);
        if page_size == 0 {
            return Err(ConfigError::InvalidValue {
                variable: "PAGE_SIZE",
                reason: "must be positive".to_string(),
            });
        }

        let pool_size = parse_env_usize("POOL_SIZE", defaults.pool_size);
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                variable: "POOL_SIZE",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            region: env_or("REGION", defaults.region),
            target_regions,
            table_name: env_or("DYNAMODB_TABLE", defaults.table_name),
            bucket: env_or("S3_BUCKET", defaults.bucket),
            default_duration_days: parse_env_i64("DEFAULT_DURATION", defaults.default_duration_days),
            page_size,
            api_base_url: env_or("SPOT_API_URL", defaults.api_base_url),
            object_store_url: env_or("OBJECT_STORE_URL", defaults.object_store_url),
            db_path: env_or("SPOT_DB_PATH", defaults.db_path),
            pool_size,
            profile: env_or("AWS_PROFILE", defaults.profile),
            retry: RetrySettings::default(),
        })
    }
}

/// Split a comma-separated region list, dropping empty entries.
#[must_use]
pub fn parse_region_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Region code local to the invoking environment.
///
/// Used when the CLI is given the `noregion` sentinel instead of an
/// explicit region list.
#[must_use]
pub fn local_region(fallback: &str) -> String {
    std::env::var("AWS_DEFAULT_REGION")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::default();
        assert_eq!(settings.target_regions, vec!["us-east-1"]);
        assert_eq!(settings.table_name, "MPCAWS_EC2_PRICETABLE");
        assert_eq!(settings.page_size, 500);
        assert_eq!(settings.pool_size, 8);
        assert_eq!(settings.default_duration_days, 1);
        assert!(settings.bucket.is_empty());
    }

    #[test]
    fn region_list_parsing() {
        assert_eq!(
            parse_region_list("us-east-1,us-west-2"),
            vec!["us-east-1", "us-west-2"]
        );
        assert_eq!(parse_region_list(" us-east-1 , "), vec!["us-east-1"]);
        assert!(parse_region_list("").is_empty());
    }

    #[test]
    fn retry_defaults() {
        let retry = RetrySettings::default();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_backoff, Duration::from_millis(100));
        assert!((retry.multiplier - 2.0).abs() < f64::EPSILON);
    }
}
