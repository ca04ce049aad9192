//! Report assembly: metrics snapshots to HTML or plain-text documents.

pub mod format;
pub mod html;
pub mod text;

use chrono::DateTime;

use crate::analytics::models::{LogRecord, MetricsSnapshot};

pub use html::render_html;
pub use text::render_text;

/// Days until the artifact download link expires.
pub const LINK_EXPIRY_DAYS: u64 = 7;

/// Historical series for the trend chart: one point per period, oldest
/// first, with the current period last.
#[derive(Debug, Clone, Default)]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub downloads: Vec<u64>,
    pub unique_users: Vec<u64>,
}

impl TrendSeries {
    /// Build a series from historical snapshots (most recent first, as
    /// fetched) plus the current one.
    pub fn from_history(
        history: &[(String, MetricsSnapshot)],
        current_label: &str,
        current: &MetricsSnapshot,
    ) -> Self {
        let mut series = Self::default();
        for (label, snapshot) in history.iter().rev() {
            series.labels.push(label.clone());
            series.downloads.push(snapshot.total_files_downloads_count);
            series.unique_users.push(snapshot.unique_users_overall);
        }
        series.labels.push(current_label.to_string());
        series.downloads.push(current.total_files_downloads_count);
        series.unique_users.push(current.unique_users_overall);
        series
    }
}

/// Shared inputs for both renderers.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    /// Display name of the data source (the query database, uppercased).
    pub source_name: String,
    /// Artifact file stem for this period.
    pub filename: String,
    /// Human-readable first/last request timestamps in the batch.
    pub timeframe: Option<(String, String)>,
    /// Presigned download link for the csv.gz artifact.
    pub download_link: Option<String>,
    /// Historical trend, when snapshots were available.
    pub trend: Option<TrendSeries>,
}

/// One renderable line of a snapshot: either a scalar metric or a ranked
/// sub-table.
pub enum Row {
    Scalar(&'static str, String),
    Section(&'static str, Vec<(String, u64)>),
}

/// Flatten a snapshot into presentation rows, in a fixed field order shared
/// by the HTML and plain-text renderers.
pub fn snapshot_rows(snapshot: &MetricsSnapshot) -> Vec<Row> {
    let mut rows = vec![
        Row::Scalar(
            "total_overall_interactions_count",
            snapshot.total_overall_interactions_count.to_string(),
        ),
        Row::Scalar(
            "total_files_downloads_count",
            snapshot.total_files_downloads_count.to_string(),
        ),
        Row::Scalar(
            "total_unique_files_downloaded",
            snapshot.total_unique_files_downloaded.to_string(),
        ),
        Row::Scalar(
            "total_dataset_uploaded_count",
            snapshot.total_dataset_uploaded_count.to_string(),
        ),
        Row::Scalar(
            "total_dataset_downloaded_size",
            snapshot.total_dataset_downloaded_size.clone(),
        ),
        Row::Scalar(
            "total_dataset_uploaded_size",
            snapshot.total_dataset_uploaded_size.clone(),
        ),
        Row::Scalar(
            "unique_users_overall",
            snapshot.unique_users_overall.to_string(),
        ),
        Row::Scalar(
            "unique_users_by_download",
            snapshot.unique_users_by_download.to_string(),
        ),
        Row::Section(
            "popular_files_by_download",
            snapshot.popular_files_by_download.clone(),
        ),
        Row::Section(
            "top_user_locations_by_download",
            snapshot.top_user_locations_by_download.clone(),
        ),
        Row::Section(
            "top_referrers_by_download",
            snapshot.top_referrers_by_download.clone(),
        ),
    ];

    let optional =
        |rows: &mut Vec<Row>, label: &'static str, table: &Option<Vec<(String, u64)>>| {
            if let Some(table) = table {
                rows.push(Row::Section(label, table.clone()));
            }
        };

    optional(
        &mut rows,
        "popular_files_by_interaction",
        &snapshot.popular_files_by_interaction,
    );
    optional(
        &mut rows,
        "popular_locations_by_interaction",
        &snapshot.popular_locations_by_interaction,
    );
    optional(
        &mut rows,
        "top_referrers_by_interaction",
        &snapshot.top_referrers_by_interaction,
    );

    if let Some(export) = &snapshot.export {
        rows.push(Row::Section(
            "popular_projects_by_download",
            export.popular_projects_by_download.clone(),
        ));
        rows.push(Row::Section(
            "popular_features_by_download",
            export.popular_features_by_download.clone(),
        ));
        rows.push(Row::Section(
            "popular_fileformats_by_download",
            export.popular_fileformats_by_download.clone(),
        ));
        optional(
            &mut rows,
            "popular_projects_by_interaction",
            &export.popular_projects_by_interaction,
        );
        optional(
            &mut rows,
            "popular_features_by_interaction",
            &export.popular_features_by_interaction,
        );
        optional(
            &mut rows,
            "popular_fileformats_by_interaction",
            &export.popular_fileformats_by_interaction,
        );
    }

    rows
}

/// Earliest and latest request timestamps in the batch, formatted for prose
/// (`February 06, 2024`). Rows with unparsable timestamps are ignored.
pub fn timeframe_of(records: &[LogRecord]) -> Option<(String, String)> {
    let mut parsed = records.iter().filter_map(|r| {
        DateTime::parse_from_str(&r.requestdatetime, "%d/%b/%Y:%H:%M:%S %z").ok()
    });

    let first = parsed.next()?;
    let (min, max) = parsed.fold((first, first), |(min, max), ts| {
        (min.min(ts), max.max(ts))
    });
    Some((
        min.format("%B %d, %Y").to_string(),
        max.format("%B %d, %Y").to_string(),
    ))
}

/// Glossary entries explaining each metric name, shared by both renderers.
pub const GLOSSARY: &[(&str, &str)] = &[
    (
        "Total Overall Interactions Count",
        "Total number of user actions performed, including file downloads and other metadata queries.",
    ),
    (
        "Total Files Downloads Count",
        "Total number of files retrieved (GET operations) from the service; the number of actual downloads performed by users.",
    ),
    (
        "Total Unique Files Downloaded",
        "Number of distinct files downloaded. The same file can be downloaded many times, so this deduplicates the download count.",
    ),
    (
        "Total Dataset Uploaded Count",
        "How many distinct files were generated or updated in object storage during this period.",
    ),
    (
        "Total Dataset Downloaded Size",
        "Aggregate size of all data downloaded by users.",
    ),
    (
        "Total Dataset Uploaded Size",
        "Aggregate size of all data uploaded or updated during the period.",
    ),
    (
        "Unique Users",
        "Distinct users interacting with the service, based on unique IP addresses. Downloads routed through a shared server may count as one IP.",
    ),
    (
        "Unique Users By Download",
        "Distinct users who actually downloaded a file, rather than only browsing metadata.",
    ),
    (
        "Most Popular Files By Download",
        "Files with the highest number of downloads.",
    ),
    (
        "Top User Locations By Download",
        "User country (alpha-2 code) resolved from the request IP; Unknown means the IP could not be located.",
    ),
    (
        "Top Referrers",
        "Origin of the request as recorded in the access log. Referrer headers are not present on all calls, so treat this as indicative only.",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: &str) -> LogRecord {
        LogRecord {
            requestid: "R".into(),
            bucket_name: String::new(),
            requestdatetime: ts.into(),
            remoteip: String::new(),
            operation: String::new(),
            key: String::new(),
            referrer: String::new(),
            objectsize: 0,
            bytessent: 0,
            httpstatus: String::new(),
            partition_date: String::new(),
        }
    }

    #[test]
    fn timeframe_spans_min_to_max() {
        let records = vec![
            record("15/Feb/2024:10:00:00 +0000"),
            record("06/Feb/2024:00:00:38 +0000"),
            record("29/Feb/2024:23:59:59 +0000"),
        ];
        let (start, end) = timeframe_of(&records).unwrap();
        assert_eq!(start, "February 06, 2024");
        assert_eq!(end, "February 29, 2024");
    }

    #[test]
    fn timeframe_empty_or_unparsable_is_none() {
        assert!(timeframe_of(&[]).is_none());
        assert!(timeframe_of(&[record("not a timestamp")]).is_none());
    }

    #[test]
    fn trend_series_puts_current_period_last() {
        let older = MetricsSnapshot {
            total_files_downloads_count: 10,
            unique_users_overall: 3,
            ..Default::default()
        };
        let newer = MetricsSnapshot {
            total_files_downloads_count: 20,
            unique_users_overall: 5,
            ..Default::default()
        };
        let current = MetricsSnapshot {
            total_files_downloads_count: 30,
            unique_users_overall: 7,
            ..Default::default()
        };

        // History is most-recent-first, as fetched from storage.
        let history = vec![("feb".to_string(), newer), ("jan".to_string(), older)];
        let series = TrendSeries::from_history(&history, "mar", &current);

        assert_eq!(series.labels, vec!["jan", "feb", "mar"]);
        assert_eq!(series.downloads, vec![10, 20, 30]);
        assert_eq!(series.unique_users, vec![3, 5, 7]);
    }
}
