//! Derived-column enrichment of raw log records.

use url::Url;

use crate::analytics::geoip::GeoIpService;
use crate::analytics::models::{EnrichedRecord, LogRecord};

/// Fallback referrer host when the referrer field is absent or unparsable.
pub const DIRECT_REFERRER: &str = "Direct or N/A";

/// Category used for the `-` sentinel key (bucket-level operations).
pub const DEFAULT_CATEGORY: &str = "default";

/// Derive the analysis columns for a batch of records.
///
/// GeoIP misses and malformed referrers degrade to sentinel values; this
/// step never fails.
pub fn enrich(records: Vec<LogRecord>, geoip: &GeoIpService) -> Vec<EnrichedRecord> {
    records
        .into_iter()
        .map(|record| {
            let method = method_of(&record.operation);
            let top_level_key = top_level_key_of(&record.key);
            let country = geoip.lookup_str(&record.remoteip);
            let referrer_host = referrer_host_of(&record.referrer);
            EnrichedRecord {
                record,
                method,
                top_level_key,
                country,
                referrer_host,
            }
        })
        .collect()
}

/// Extract the HTTP verb from an operation code like `REST.GET.OBJECT`.
/// Operations without the `<CLASS>.<VERB>` shape pass through unchanged.
pub fn method_of(operation: &str) -> String {
    operation
        .split('.')
        .nth(1)
        .unwrap_or(operation)
        .to_string()
}

/// First slash-delimited segment of the object key, with the `-` sentinel
/// normalized to the `default` category.
pub fn top_level_key_of(key: &str) -> String {
    if key == "-" {
        return DEFAULT_CATEGORY.to_string();
    }
    key.split('/').next().unwrap_or(key).to_string()
}

/// Network-location component of the referrer field. The raw value is often
/// wrapped in quotes by the log format.
pub fn referrer_host_of(referrer: &str) -> String {
    let trimmed = referrer.trim().trim_matches('"');
    Url::parse(trimmed)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| DIRECT_REFERRER.to_string())
}
