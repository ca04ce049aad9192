//! Metrics aggregation over enriched log records.
//!
//! All rankings are deterministic for a fixed input: ties are broken by the
//! first occurrence of a value in the input batch, so re-running a report
//! over the same table yields a bit-identical snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::analytics::models::{
    DailyMetrics, DailyStats, EnrichedRecord, ExportBreakdown, MetricsSnapshot,
};
use crate::report::format::format_bytes;

/// Scopes that are generic categories rather than export trees; positional
/// project/feature/fileformat breakdowns are meaningless for these.
const NON_EXPORT_SCOPES: &[&str] = &["default", "athena", "FAVICON.ICO", "TEST-OBJECT"];

/// Folders excluded from the per-folder report sections.
const EXCLUDED_FOLDERS: &[&str] = &["athena", "TEST-OBJECT"];

const TOP_FILES: usize = 10;
const TOP_LOCATIONS: usize = 5;
const TOP_REFERRERS: usize = 5;
const TOP_EXPORT: usize = 5;

/// Occurrence counter with a deterministic ranking order: count descending,
/// ties broken by first occurrence.
#[derive(Debug, Default)]
pub struct Counter {
    counts: HashMap<String, (u64, usize)>,
    next_index: usize,
}

impl Counter {
    pub fn add(&mut self, value: &str) {
        match self.counts.get_mut(value) {
            Some((count, _)) => *count += 1,
            None => {
                self.counts
                    .insert(value.to_string(), (1, self.next_index));
                self.next_index += 1;
            }
        }
    }

    /// Top `n` values by count.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(&String, &(u64, usize))> = self.counts.iter().collect();
        entries.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
        entries
            .into_iter()
            .take(n)
            .map(|(value, (count, _))| (value.clone(), *count))
            .collect()
    }

    /// All values in ranking order.
    pub fn ranked(&self) -> Vec<(String, u64)> {
        self.top(usize::MAX)
    }
}

fn count_top<'a, I>(values: I, n: usize) -> Vec<(String, u64)>
where
    I: Iterator<Item = &'a str>,
{
    let mut counter = Counter::default();
    for value in values {
        counter.add(value);
    }
    counter.top(n)
}

fn unique_count<'a, I>(values: I) -> u64
where
    I: Iterator<Item = &'a str>,
{
    values.collect::<HashSet<_>>().len() as u64
}

/// True when the operation is a read or metadata query rather than a write.
fn is_interaction(method: &str) -> bool {
    !matches!(method, "POST" | "PUT" | "DELETE")
}

fn is_upload(method: &str) -> bool {
    matches!(method, "PUT" | "POST")
}

/// Whether a folder gets its own report section. Log folders and known
/// test/engine artifacts are skipped.
pub fn is_reportable_folder(name: &str) -> bool {
    !name.starts_with("log") && !EXCLUDED_FOLDERS.contains(&name)
}

/// Whether a scope carries export-tree semantics (project/feature/format
/// path segments).
fn is_export_scope(scope: &str) -> bool {
    !NON_EXPORT_SCOPES.contains(&scope)
}

/// Second path segment of the key, the project an export belongs to.
fn project_of(key: &str) -> &str {
    key.split('/').nth(1).unwrap_or("NA")
}

/// Third path segment of the key, the feature type of an export.
fn feature_of(key: &str) -> &str {
    key.split('/').nth(2).unwrap_or("NA")
}

/// File-format heuristic: the stem after the last underscore, up to the
/// first dot. Keys without an underscore carry no format suffix.
fn file_format_of(key: &str) -> String {
    if !key.contains('_') {
        return "NA".to_string();
    }
    let last = key.rsplit('_').next().unwrap_or("");
    let stem = last.split('.').next().unwrap_or("");
    if stem.contains('/') {
        "Other".to_string()
    } else {
        stem.to_string()
    }
}

/// Compute a [`MetricsSnapshot`] for a scope.
///
/// `scope = None` analyzes the full batch; `Some(folder)` restricts to one
/// top-level key. Rows touching `meta.json` bookkeeping objects are always
/// excluded. Interaction variants of the download rankings are emitted only
/// when `interaction_metrics` is set and the variant actually differs.
pub fn analyze(
    rows: &[EnrichedRecord],
    scope: Option<&str>,
    interaction_metrics: bool,
) -> MetricsSnapshot {
    let scoped: Vec<&EnrichedRecord> = rows
        .iter()
        .filter(|row| !row.record.key.contains("meta.json"))
        .filter(|row| scope.is_none_or(|s| row.top_level_key == s))
        .collect();

    let interactions: Vec<&EnrichedRecord> = scoped
        .iter()
        .copied()
        .filter(|row| is_interaction(&row.method))
        .collect();
    let downloads: Vec<&EnrichedRecord> = scoped
        .iter()
        .copied()
        .filter(|row| row.method == "GET")
        .collect();
    let uploads: Vec<&EnrichedRecord> = scoped
        .iter()
        .copied()
        .filter(|row| is_upload(&row.method))
        .collect();

    let popular_files_by_download =
        count_top(downloads.iter().map(|r| r.record.key.as_str()), TOP_FILES);
    let top_user_locations_by_download =
        count_top(downloads.iter().map(|r| r.country.as_str()), TOP_LOCATIONS);
    let top_referrers_by_download = count_top(
        downloads.iter().map(|r| r.referrer_host.as_str()),
        TOP_REFERRERS,
    );

    // An interaction variant is only worth a section when it tells a
    // different story than the download ranking.
    let variant = |download: &Vec<(String, u64)>, interaction: Vec<(String, u64)>| {
        (interaction_metrics && *download != interaction).then_some(interaction)
    };

    let popular_files_by_interaction = variant(
        &popular_files_by_download,
        count_top(interactions.iter().map(|r| r.record.key.as_str()), TOP_FILES),
    );
    let popular_locations_by_interaction = variant(
        &top_user_locations_by_download,
        count_top(interactions.iter().map(|r| r.country.as_str()), TOP_LOCATIONS),
    );
    let top_referrers_by_interaction = variant(
        &top_referrers_by_download,
        count_top(
            interactions.iter().map(|r| r.referrer_host.as_str()),
            TOP_REFERRERS,
        ),
    );

    let export = scope.filter(|s| is_export_scope(s)).map(|_| {
        let formats: Vec<String> = downloads
            .iter()
            .map(|r| file_format_of(&r.record.key))
            .collect();
        let interaction_formats: Vec<String> = interactions
            .iter()
            .map(|r| file_format_of(&r.record.key))
            .collect();

        let popular_projects_by_download = count_top(
            downloads.iter().map(|r| project_of(&r.record.key)),
            TOP_EXPORT,
        );
        let popular_features_by_download = count_top(
            downloads.iter().map(|r| feature_of(&r.record.key)),
            TOP_EXPORT,
        );
        let popular_fileformats_by_download =
            count_top(formats.iter().map(String::as_str), TOP_EXPORT);

        let popular_projects_by_interaction = variant(
            &popular_projects_by_download,
            count_top(
                interactions.iter().map(|r| project_of(&r.record.key)),
                TOP_EXPORT,
            ),
        );
        let popular_features_by_interaction = variant(
            &popular_features_by_download,
            count_top(
                interactions.iter().map(|r| feature_of(&r.record.key)),
                TOP_EXPORT,
            ),
        );
        let popular_fileformats_by_interaction = variant(
            &popular_fileformats_by_download,
            count_top(interaction_formats.iter().map(String::as_str), TOP_EXPORT),
        );

        ExportBreakdown {
            popular_projects_by_download,
            popular_features_by_download,
            popular_fileformats_by_download,
            popular_projects_by_interaction,
            popular_features_by_interaction,
            popular_fileformats_by_interaction,
        }
    });

    MetricsSnapshot {
        scope: scope.map(str::to_string),
        total_overall_interactions_count: interactions.len() as u64,
        total_files_downloads_count: downloads.len() as u64,
        total_unique_files_downloaded: unique_count(
            downloads.iter().map(|r| r.record.key.as_str()),
        ),
        total_dataset_uploaded_count: unique_count(uploads.iter().map(|r| r.record.key.as_str())),
        total_dataset_downloaded_size: format_bytes(
            downloads.iter().map(|r| r.record.bytessent).sum::<i64>(),
        ),
        total_dataset_uploaded_size: format_bytes(
            uploads.iter().map(|r| r.record.objectsize).sum::<i64>(),
        ),
        unique_users_overall: unique_count(scoped.iter().map(|r| r.record.remoteip.as_str())),
        unique_users_by_download: unique_count(
            downloads.iter().map(|r| r.record.remoteip.as_str()),
        ),
        popular_files_by_download,
        top_user_locations_by_download,
        top_referrers_by_download,
        popular_files_by_interaction,
        popular_locations_by_interaction,
        top_referrers_by_interaction,
        export,
    }
}

/// Distinct top-level keys of the batch, in first-occurrence order.
pub fn folders(rows: &[EnrichedRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for row in rows {
        if seen.insert(row.top_level_key.as_str()) {
            result.push(row.top_level_key.clone());
        }
    }
    result
}

/// Group the batch by partition date and compute per-day statistics for
/// the relational sink. Days come out in chronological order.
pub fn analyze_by_day(rows: &[EnrichedRecord]) -> Vec<DailyMetrics> {
    let mut by_day: BTreeMap<&str, Vec<&EnrichedRecord>> = BTreeMap::new();
    for row in rows {
        by_day
            .entry(row.record.partition_date.as_str())
            .or_default()
            .push(row);
    }

    by_day
        .into_iter()
        .map(|(date, day_rows)| {
            let interactions: Vec<&&EnrichedRecord> = day_rows
                .iter()
                .filter(|row| is_interaction(&row.method))
                .collect();
            let downloads: Vec<&&EnrichedRecord> =
                day_rows.iter().filter(|row| row.method == "GET").collect();
            let uploads: Vec<&&EnrichedRecord> = day_rows
                .iter()
                .filter(|row| is_upload(&row.method))
                .collect();

            let stats = DailyStats {
                interactions_count: interactions.len() as u64,
                downloads_count: downloads.len() as u64,
                unique_downloads: unique_count(downloads.iter().map(|r| r.record.key.as_str())),
                uploads_count: unique_count(uploads.iter().map(|r| r.record.key.as_str())),
                download_size: downloads.iter().map(|r| r.record.bytessent).sum(),
                upload_size: uploads.iter().map(|r| r.record.objectsize).sum(),
                unique_users: unique_count(day_rows.iter().map(|r| r.record.remoteip.as_str())),
            };

            DailyMetrics {
                date: date.to_string(),
                stats,
                files_by_download: {
                    let mut counter = Counter::default();
                    for row in &downloads {
                        counter.add(&row.record.key);
                    }
                    counter.ranked()
                },
                locations: {
                    let mut counter = Counter::default();
                    for row in &day_rows {
                        counter.add(&row.country);
                    }
                    counter.ranked()
                },
                referrers: {
                    let mut counter = Counter::default();
                    for row in &day_rows {
                        counter.add(&row.referrer_host);
                    }
                    counter.ranked()
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::geoip::GeoIpService;
    use crate::analytics::models::LogRecord;
    use crate::analytics::prepare::enrich;

    fn record(requestid: &str, operation: &str, key: &str, ip: &str) -> LogRecord {
        LogRecord {
            requestid: requestid.into(),
            bucket_name: String::new(),
            requestdatetime: "06/Feb/2024:00:00:38 +0000".into(),
            remoteip: ip.into(),
            operation: operation.into(),
            key: key.into(),
            referrer: "-".into(),
            objectsize: 0,
            bytessent: 0,
            httpstatus: "200".into(),
            partition_date: "2024/02/06".into(),
        }
    }

    fn enriched(records: Vec<LogRecord>) -> Vec<EnrichedRecord> {
        enrich(records, &GeoIpService::new(None).unwrap())
    }

    #[test]
    fn scoped_scenario_counts_downloads_and_uploads() {
        let mut download = record("R1", "REST.GET.OBJECT", "TM/proj1/f.geojson", "1.2.3.4");
        download.bytessent = 2048;
        let mut upload = record("R2", "REST.PUT.OBJECT", "TM/proj1/f.geojson", "5.6.7.8");
        upload.objectsize = 4096;

        let rows = enriched(vec![download, upload]);
        let snapshot = analyze(&rows, Some("TM"), false);

        assert_eq!(snapshot.total_files_downloads_count, 1);
        assert_eq!(snapshot.total_dataset_uploaded_count, 1);
        assert_eq!(snapshot.unique_users_overall, 2);
        assert_eq!(snapshot.unique_users_by_download, 1);
        assert_eq!(snapshot.total_dataset_downloaded_size, "2.0 kB");
        assert_eq!(snapshot.total_dataset_uploaded_size, "4.1 kB");
    }

    #[test]
    fn unique_users_overall_never_below_downloaders() {
        let rows = enriched(vec![
            record("R1", "REST.GET.OBJECT", "TM/a", "1.1.1.1"),
            record("R2", "REST.HEAD.OBJECT", "TM/a", "2.2.2.2"),
            record("R3", "REST.GET.OBJECT", "TM/b", "1.1.1.1"),
        ]);
        let snapshot = analyze(&rows, None, false);
        assert!(snapshot.unique_users_overall >= snapshot.unique_users_by_download);
    }

    #[test]
    fn meta_json_rows_are_ignored() {
        let rows = enriched(vec![
            record("R1", "REST.GET.OBJECT", "TM/proj1/meta.json", "1.1.1.1"),
            record("R2", "REST.GET.OBJECT", "TM/proj1/f.zip", "1.1.1.1"),
        ]);
        let snapshot = analyze(&rows, None, false);
        assert_eq!(snapshot.total_files_downloads_count, 1);
        assert_eq!(snapshot.popular_files_by_download[0].0, "TM/proj1/f.zip");
    }

    #[test]
    fn export_breakdown_only_for_export_scopes() {
        let rows = enriched(vec![
            record("R1", "REST.GET.OBJECT", "TM/proj1/shp/f_shp.zip", "1.1.1.1"),
            record("R2", "REST.GET.OBJECT", "default/f.zip", "1.1.1.1"),
        ]);

        let tm = analyze(&rows, Some("TM"), false);
        let export = tm.export.expect("TM is an export scope");
        assert_eq!(export.popular_projects_by_download[0].0, "proj1");
        assert_eq!(export.popular_features_by_download[0].0, "shp");
        assert_eq!(export.popular_fileformats_by_download[0].0, "shp");

        let default = analyze(&rows, Some("default"), false);
        assert!(default.export.is_none());

        let overall = analyze(&rows, None, false);
        assert!(overall.export.is_none());
    }

    #[test]
    fn interaction_variants_omitted_when_identical() {
        // Downloads only: interaction rankings equal download rankings.
        let rows = enriched(vec![
            record("R1", "REST.GET.OBJECT", "TM/a", "1.1.1.1"),
            record("R2", "REST.GET.OBJECT", "TM/a", "1.1.1.1"),
        ]);
        let snapshot = analyze(&rows, None, true);
        assert!(snapshot.popular_files_by_interaction.is_none());

        // A HEAD on a different key makes the interaction ranking diverge.
        let rows = enriched(vec![
            record("R1", "REST.GET.OBJECT", "TM/a", "1.1.1.1"),
            record("R2", "REST.HEAD.OBJECT", "TM/b", "1.1.1.1"),
        ]);
        let snapshot = analyze(&rows, None, true);
        assert!(snapshot.popular_files_by_interaction.is_some());

        // Without the flag the variant is suppressed even when different.
        let snapshot = analyze(&rows, None, false);
        assert!(snapshot.popular_files_by_interaction.is_none());
    }

    #[test]
    fn ranking_ties_break_by_first_occurrence() {
        let mut counter = Counter::default();
        for value in ["b", "a", "c", "a", "b", "c"] {
            counter.add(value);
        }
        // All counts equal; order must follow first occurrence.
        assert_eq!(
            counter.top(3),
            vec![("b".to_string(), 2), ("a".to_string(), 2), ("c".to_string(), 2)]
        );
    }

    #[test]
    fn dash_key_rows_land_in_default_category() {
        let rows = enriched(vec![record("R1", "REST.GET.OBJECT", "-", "1.1.1.1")]);
        assert_eq!(folders(&rows), vec!["default"]);
        let snapshot = analyze(&rows, Some("default"), false);
        assert_eq!(snapshot.total_files_downloads_count, 1);
    }

    #[test]
    fn folder_skip_rules() {
        assert!(is_reportable_folder("TM"));
        assert!(is_reportable_folder("default"));
        assert!(!is_reportable_folder("logs"));
        assert!(!is_reportable_folder("log-archive"));
        assert!(!is_reportable_folder("athena"));
        assert!(!is_reportable_folder("TEST-OBJECT"));
    }

    #[test]
    fn daily_metrics_group_by_partition_date() {
        let mut day1 = record("R1", "REST.GET.OBJECT", "TM/a", "1.1.1.1");
        day1.partition_date = "2024/02/06".into();
        day1.bytessent = 100;
        let mut day2 = record("R2", "REST.PUT.OBJECT", "TM/b", "2.2.2.2");
        day2.partition_date = "2024/02/07".into();
        day2.objectsize = 300;

        let daily = analyze_by_day(&enriched(vec![day2, day1]));
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, "2024/02/06");
        assert_eq!(daily[0].stats.downloads_count, 1);
        assert_eq!(daily[0].stats.download_size, 100);
        assert_eq!(daily[1].date, "2024/02/07");
        assert_eq!(daily[1].stats.uploads_count, 1);
        assert_eq!(daily[1].stats.upload_size, 300);
    }

    #[test]
    fn file_format_heuristic() {
        assert_eq!(file_format_of("TM/p/f_shp.zip"), "shp");
        assert_eq!(file_format_of("TM/p/plain.zip"), "NA");
        assert_eq!(file_format_of("TM/a_b/c.zip"), "Other");
    }
}
