//! Plain-text report rendering, the multipart/alternative fallback for
//! mail clients that do not render HTML.

use crate::analytics::models::MetricsSnapshot;
use crate::report::format::{intcomma, title_case};
use crate::report::{snapshot_rows, ReportContext, Row, GLOSSARY, LINK_EXPIRY_DAYS};

/// Render the report email body as plain text.
pub fn render_text(
    overall: &MetricsSnapshot,
    folder_snapshots: &[MetricsSnapshot],
    ctx: &ReportContext,
) -> String {
    let mut body = String::new();
    body.push_str("Dear Colleague,\n\n");

    match &ctx.timeframe {
        Some((start, end)) => {
            body.push_str(&format!(
                "Please find the comprehensive {} usage report for the period spanning \
                 from {start} to {end}. This report begins with an overall summary of the \
                 service usage, followed by a detailed breakdown by the different sections \
                 that use it.\n\n",
                ctx.source_name,
            ));
        }
        None => {
            body.push_str(&format!(
                "Please find the comprehensive {} usage report for this period.\n\n",
                ctx.source_name,
            ));
        }
    }

    body.push_str(&metrics_section(overall, &ctx.source_name));
    for snapshot in folder_snapshots {
        let title = snapshot
            .scope
            .as_deref()
            .map(|s| format!("section: {s}"))
            .unwrap_or_else(|| "section".to_string());
        body.push_str(&metrics_section(snapshot, &title));
    }

    body.push_str("UNDERSTANDING THE METRICS\n\n");
    for (term, definition) in GLOSSARY {
        body.push_str(&format!("* {term}: {definition}\n"));
    }
    body.push('\n');

    body.push_str(&format!(
        "This email ({}) is auto-generated and might contain confidential data.",
        ctx.filename,
    ));
    if let Some(link) = &ctx.download_link {
        body.push_str(&format!(
            " You can download the complete CSV logs for your own analysis from {link} \
             (this link auto-expires in {LINK_EXPIRY_DAYS} days)."
        ));
    }
    body.push_str(" If you have any other queries, please reply to this email.\n");
    body
}

fn metrics_section(snapshot: &MetricsSnapshot, title: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n{}\n\n", title.to_uppercase(), "=".repeat(title.len())));
    out.push_str(&format!(
        "Throughout this period, {} received {} interactions from {} unique users. \
         A total of {} unique users downloaded {} files {} times, amounting to {} of \
         data; {} files were updated, adding up to {} of content.\n\n",
        title,
        intcomma(snapshot.total_overall_interactions_count),
        intcomma(snapshot.unique_users_overall),
        intcomma(snapshot.unique_users_by_download),
        intcomma(snapshot.total_unique_files_downloaded),
        intcomma(snapshot.total_files_downloads_count),
        snapshot.total_dataset_downloaded_size,
        intcomma(snapshot.total_dataset_uploaded_count),
        snapshot.total_dataset_uploaded_size,
    ));

    for row in snapshot_rows(snapshot) {
        match row {
            Row::Scalar(label, value) => {
                out.push_str(&format!("  {}: {}\n", title_case(label), value));
            }
            Row::Section(label, entries) => {
                out.push_str(&format!("  {}:\n", title_case(label)));
                for (value, count) in entries {
                    out.push_str(&format!("    - {value}: {count}\n"));
                }
            }
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_report_has_summary_and_rankings() {
        let snapshot = MetricsSnapshot {
            total_overall_interactions_count: 1234,
            unique_users_overall: 56,
            popular_files_by_download: vec![("TM/proj1/f.geojson".into(), 7)],
            total_dataset_downloaded_size: "2.0 kB".into(),
            total_dataset_uploaded_size: "0 Bytes".into(),
            ..Default::default()
        };
        let ctx = ReportContext {
            source_name: "LOGS".into(),
            filename: "2024_02_01-2024_02_29".into(),
            timeframe: None,
            download_link: Some("https://example.com/signed".into()),
            trend: None,
        };

        let text = render_text(&snapshot, &[], &ctx);
        assert!(text.contains("Dear Colleague"));
        assert!(text.contains("1,234 interactions"));
        assert!(text.contains("- TM/proj1/f.geojson: 7"));
        assert!(text.contains("https://example.com/signed"));
        assert!(text.contains("auto-expires in 7 days"));
        assert!(!text.contains('<'));
    }
}
