//! End-to-end pipeline tests over in-memory batches.
//!
//! These exercise the full local path a run takes after a query result is
//! materialized: CSV parsing, batch merging, enrichment, metrics
//! aggregation, and report rendering. No remote services are involved.

use s3tally::analytics::{analyze, analyze_by_day, enrich, folders, is_reportable_folder, GeoIpService};
use s3tally::athena::{merge_dedup, parse_result_csv};
use s3tally::report::{render_html, render_text, timeframe_of, ReportContext};
use s3tally::storage::SnapshotDocument;

const RESULT_CSV: &str = "\
requestid,operation,key,referrer,objectsize,bytessent,httpstatus,requestdatetime,timestamp,remoteip
R1,REST.GET.OBJECT,TM/project1/file_shp.zip,\"\"\"https://tasks.example.org/\"\"\",-,2048,200,06/Feb/2024:00:00:38 +0000,2024/02/06,1.2.3.4
R2,REST.GET.OBJECT,TM/project1/file_shp.zip,-,-,2048,200,07/Feb/2024:09:15:02 +0000,2024/02/07,5.6.7.8
R3,REST.PUT.OBJECT,TM/project2/other_geojson.zip,-,4096,-,200,07/Feb/2024:10:00:00 +0000,2024/02/07,5.6.7.8
R4,REST.HEAD.OBJECT,TM/project1/meta.json,-,-,-,200,08/Feb/2024:11:00:00 +0000,2024/02/08,1.2.3.4
R5,REST.GET.OBJECT,athena/results/meta/run.csv,-,-,100,200,08/Feb/2024:12:00:00 +0000,2024/02/08,9.9.9.9
R6,REST.GET.OBJECT,-,-,-,50,200,08/Feb/2024:13:00:00 +0000,2024/02/08,9.9.9.9
";

fn pipeline() -> Vec<s3tally::analytics::EnrichedRecord> {
    let records = parse_result_csv(RESULT_CSV.as_bytes()).unwrap();
    let geoip = GeoIpService::new(None).unwrap();
    enrich(records, &geoip)
}

#[test]
fn metrics_flow_from_raw_csv() {
    let rows = pipeline();
    let overall = analyze(&rows, None, false);

    // R4 touches meta.json and is excluded everywhere; R3 is a write.
    assert_eq!(overall.total_overall_interactions_count, 4);
    // Downloads: R1, R2, R5, R6.
    assert_eq!(overall.total_files_downloads_count, 4);
    assert_eq!(overall.total_dataset_downloaded_size, "4.2 kB");
    assert_eq!(overall.total_dataset_uploaded_size, "4.1 kB");
    assert_eq!(
        overall.popular_files_by_download[0],
        ("TM/project1/file_shp.zip".to_string(), 2)
    );
    assert_eq!(overall.unique_users_overall, 3);
}

#[test]
fn folder_sections_skip_engine_and_log_folders() {
    let rows = pipeline();
    let reportable: Vec<String> = folders(&rows)
        .into_iter()
        .filter(|name| is_reportable_folder(name))
        .collect();
    // "athena" is dropped; the "-" key lands in "default".
    assert_eq!(reportable, vec!["TM".to_string(), "default".to_string()]);
}

#[test]
fn rerun_with_overlapping_result_is_stable() {
    let first = parse_result_csv(RESULT_CSV.as_bytes()).unwrap();
    let second = parse_result_csv(RESULT_CSV.as_bytes()).unwrap();
    let merged = merge_dedup(first.clone(), second);
    assert_eq!(merged.len(), first.len());

    let geoip = GeoIpService::new(None).unwrap();
    let snapshot_once = analyze(&enrich(first, &geoip), None, false);
    let snapshot_merged = analyze(&enrich(merged, &geoip), None, false);
    assert_eq!(
        serde_json::to_string(&snapshot_once).unwrap(),
        serde_json::to_string(&snapshot_merged).unwrap()
    );
}

#[test]
fn rendered_reports_cover_all_sections() {
    let rows = pipeline();
    let overall = analyze(&rows, None, false);
    let folder_snapshots: Vec<_> = folders(&rows)
        .iter()
        .filter(|name| is_reportable_folder(name.as_str()))
        .map(|name| analyze(&rows, Some(name.as_str()), false))
        .collect();

    let records = parse_result_csv(RESULT_CSV.as_bytes()).unwrap();
    let ctx = ReportContext {
        source_name: "S3_ACCESS_LOGS".into(),
        filename: "2024_02_01-2024_02_29".into(),
        timeframe: timeframe_of(&records),
        download_link: None,
        trend: None,
    };

    let html = render_html(&overall, &folder_snapshots, &ctx);
    assert!(html.contains("February 06, 2024"));
    assert!(html.contains("February 08, 2024"));
    assert!(html.contains("SECTION: TM"));
    assert!(html.contains("SECTION: DEFAULT"));
    assert!(html.contains("tasks.example.org"));

    let text = render_text(&overall, &folder_snapshots, &ctx);
    assert!(text.contains("SECTION: TM"));
    assert!(text.contains("Top Referrers By Download"));
}

#[test]
fn snapshot_document_round_trips_through_json() {
    let rows = pipeline();
    let overall = analyze(&rows, None, true);
    let document = SnapshotDocument {
        period: "2024_02_01-2024_02_29".into(),
        overall,
        folders: vec![analyze(&rows, Some("TM"), true)],
    };

    let json = serde_json::to_vec_pretty(&document).unwrap();
    let parsed: SnapshotDocument = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed.period, document.period);
    assert_eq!(
        parsed.overall.total_files_downloads_count,
        document.overall.total_files_downloads_count
    );
    assert_eq!(parsed.folders[0].scope.as_deref(), Some("TM"));
}

#[test]
fn daily_breakdown_matches_partition_dates() {
    let rows = pipeline();
    let daily = analyze_by_day(&rows);
    let dates: Vec<&str> = daily.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2024/02/06", "2024/02/07", "2024/02/08"]);

    // Feb 7 has one download (R2, 2048 bytes) and one upload (R3).
    assert_eq!(daily[1].stats.downloads_count, 1);
    assert_eq!(daily[1].stats.download_size, 2048);
    assert_eq!(daily[1].stats.uploads_count, 1);
    assert_eq!(daily[1].stats.upload_size, 4096);
}
