//! Data models for access log analytics.

use serde::{Deserialize, Deserializer, Serialize};

/// One row of the access log table, as returned by the query engine.
///
/// `requestid` is the deduplication key across merged batches; the latest
/// write wins. Numeric fields are zero-filled when the source value is
/// absent or unparsable (`-` placeholders are common in server access logs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub requestid: String,
    #[serde(default)]
    pub bucket_name: String,
    /// Request time in the log's fixed textual format, e.g.
    /// `06/Feb/2024:00:00:38 +0000`.
    #[serde(default)]
    pub requestdatetime: String,
    #[serde(default)]
    pub remoteip: String,
    /// Operation code with the method embedded as `<CLASS>.<VERB>`,
    /// e.g. `REST.GET.OBJECT`.
    #[serde(default)]
    pub operation: String,
    /// Slash-delimited object key; `-` for bucket-level operations.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub objectsize: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub bytessent: i64,
    #[serde(default)]
    pub httpstatus: String,
    /// Partition date in `YYYY/MM/DD` form.
    #[serde(rename = "timestamp", default)]
    pub partition_date: String,
}

/// Coerce a numeric column with zero-fill on parse failure.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(0))
}

/// A log record with the derived columns used by the metrics aggregator.
#[derive(Debug, Clone)]
pub struct EnrichedRecord {
    pub record: LogRecord,
    /// HTTP verb extracted from the operation code (`GET`, `PUT`, ...).
    pub method: String,
    /// First slash-delimited segment of the key; the `-` sentinel maps to
    /// the `default` category.
    pub top_level_key: String,
    /// ISO country code from GeoIP, or `Unknown`.
    pub country: String,
    /// Network-location component of the referrer, or `Direct or N/A`.
    pub referrer_host: String,
}

/// Computed metrics for one scope (overall or a single top-level folder).
///
/// Ranked sub-tables are ordered vectors rather than maps so that the
/// serialized snapshot is bit-identical across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub total_overall_interactions_count: u64,
    pub total_files_downloads_count: u64,
    pub total_unique_files_downloaded: u64,
    pub total_dataset_uploaded_count: u64,
    pub total_dataset_downloaded_size: String,
    pub total_dataset_uploaded_size: String,
    pub unique_users_overall: u64,
    pub unique_users_by_download: u64,
    pub popular_files_by_download: Vec<(String, u64)>,
    pub top_user_locations_by_download: Vec<(String, u64)>,
    pub top_referrers_by_download: Vec<(String, u64)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popular_files_by_interaction: Option<Vec<(String, u64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popular_locations_by_interaction: Option<Vec<(String, u64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_referrers_by_interaction: Option<Vec<(String, u64)>>,

    /// Present only when the scope is a recognized export category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportBreakdown>,
}

/// Project / feature / file-format rankings derived from positional path
/// segments, for export-category scopes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportBreakdown {
    pub popular_projects_by_download: Vec<(String, u64)>,
    pub popular_features_by_download: Vec<(String, u64)>,
    pub popular_fileformats_by_download: Vec<(String, u64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popular_projects_by_interaction: Option<Vec<(String, u64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popular_features_by_interaction: Option<Vec<(String, u64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popular_fileformats_by_interaction: Option<Vec<(String, u64)>>,
}

/// Per-day statistics for the relational sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub interactions_count: u64,
    pub downloads_count: u64,
    pub unique_downloads: u64,
    pub uploads_count: u64,
    pub download_size: i64,
    pub upload_size: i64,
    pub unique_users: u64,
}

/// One row of the daily metrics table: headline stats plus the full
/// (untruncated) ranking tables for that day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetrics {
    /// Partition date in `YYYY/MM/DD` form.
    pub date: String,
    pub stats: DailyStats,
    pub files_by_download: Vec<(String, u64)>,
    pub locations: Vec<(String, u64)>,
    pub referrers: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_row_with_dash_sizes_is_zero_filled() {
        let data = "requestid,operation,key,referrer,objectsize,bytessent,httpstatus,requestdatetime,timestamp,remoteip\n\
            R1,REST.GET.OBJECT,TM/f.zip,-,-,2048,200,06/Feb/2024:00:00:38 +0000,2024/02/06,1.2.3.4\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let record: LogRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(record.objectsize, 0);
        assert_eq!(record.bytessent, 2048);
        assert_eq!(record.partition_date, "2024/02/06");
        assert_eq!(record.bucket_name, "");
    }
}
