//! HTML report rendering with inline styling.
//!
//! Every interpolated value that originates from log data (keys, referrer
//! hosts, folder names) is escaped before it reaches the markup.

use crate::analytics::models::MetricsSnapshot;
use crate::report::format::{escape_html, intcomma, title_case};
use crate::report::{snapshot_rows, ReportContext, Row, GLOSSARY, LINK_EXPIRY_DAYS};

const TH_STYLE: &str = "border: 1px solid #ddd; padding: 12px 15px; text-align: left; \
background-color: #D73F3F; color: #ffffff; font-size: 16px;";

/// Render the full report email body as HTML.
pub fn render_html(
    overall: &MetricsSnapshot,
    folder_snapshots: &[MetricsSnapshot],
    ctx: &ReportContext,
) -> String {
    let mut body = String::new();
    body.push_str("<html>\n<head>\n</head>\n<body>\n");
    body.push_str("<p>Dear Colleague,</p>\n");

    match &ctx.timeframe {
        Some((start, end)) => {
            body.push_str(&format!(
                "<p>Please find the comprehensive {} usage report for the period spanning \
                 from <strong>{}</strong> to <strong>{}</strong>. This report begins with an \
                 overall summary of the service usage, followed by a detailed breakdown by \
                 the different sections that use it.</p>\n",
                escape_html(&ctx.source_name),
                escape_html(start),
                escape_html(end),
            ));
        }
        None => {
            body.push_str(&format!(
                "<p>Please find the comprehensive {} usage report for this period.</p>\n",
                escape_html(&ctx.source_name),
            ));
        }
    }

    if let Some(trend) = &ctx.trend {
        body.push_str(&trend_chart(
            &trend.labels,
            &trend.downloads,
            &trend.unique_users,
        ));
    }

    body.push_str(&metrics_table(overall, &ctx.source_name));
    for snapshot in folder_snapshots {
        let title = snapshot
            .scope
            .as_deref()
            .map(|s| format!("section: {s}"))
            .unwrap_or_else(|| "section".to_string());
        body.push_str(&metrics_table(snapshot, &title));
    }

    body.push_str(&glossary_section());
    body.push_str(&footer(ctx));
    body.push_str("</body>\n</html>\n");
    body
}

/// One collapsible section per snapshot: summary prose plus a two-column
/// metric/value table, with ranked sub-tables as nested rows.
fn metrics_table(snapshot: &MetricsSnapshot, title: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<details><summary><h3 style='font-family: Arial, sans-serif;'>{}</h3></summary>\n",
        escape_html(&title.to_uppercase())
    ));
    out.push_str("<div style='margin-top: 10px;'>\n");
    out.push_str(&summary_prose(snapshot, title));
    out.push_str(
        "<table style='border-collapse: collapse; width: 100%; margin-top: 20px; \
         margin-bottom: 40px;'>\n",
    );
    out.push_str(&format!(
        "<tr><th style='{TH_STYLE}'>Metric</th><th style='{TH_STYLE}'>Value</th></tr>\n"
    ));

    for row in snapshot_rows(snapshot) {
        match row {
            Row::Scalar(label, value) => {
                out.push_str(&format!(
                    "<tr><td style='font-weight: bold; border: 1px solid #ddd; \
                     padding: 12px 15px;'>{}</td><td style='border: 1px solid #ddd; \
                     padding: 12px 15px;'>{}</td></tr>\n",
                    escape_html(&title_case(label)),
                    escape_html(&value),
                ));
            }
            Row::Section(label, entries) => {
                out.push_str(&format!(
                    "<tr><td colspan='2' style='background-color: #f2f2f2; \
                     padding: 12px 15px; font-weight: bold;'>{}</td></tr>\n",
                    escape_html(&title_case(label)),
                ));
                for (value, count) in entries {
                    out.push_str(&format!(
                        "<tr><td style='padding-left: 25px; font-style: italic; color: #555; \
                         border: 1px solid #ddd; padding: 8px 15px;'>{}</td>\
                         <td style='border: 1px solid #ddd; padding: 8px 15px;'>{}</td></tr>\n",
                        escape_html(&value),
                        count,
                    ));
                }
            }
        }
    }

    out.push_str("</table>\n</div></details>\n");
    out
}

fn summary_prose(snapshot: &MetricsSnapshot, title: &str) -> String {
    format!(
        "<div style='text-align: justify;'>\n\
         <p>Throughout this period, {} received <strong>{}</strong> interactions from \
         <strong>{}</strong> unique users, including data views, downloads, and metadata \
         queries. Out of {} users, a total of <strong>{}</strong> unique users downloaded \
         <strong>{}</strong> files <strong>{}</strong> times, amounting to \
         <strong>{}</strong> of data. Moreover, <strong>{}</strong> files were updated, \
         adding up to <strong>{}</strong> of content. More information is tabularized and \
         listed below.</p>\n</div>\n",
        escape_html(title),
        intcomma(snapshot.total_overall_interactions_count),
        intcomma(snapshot.unique_users_overall),
        intcomma(snapshot.unique_users_overall),
        intcomma(snapshot.unique_users_by_download),
        intcomma(snapshot.total_unique_files_downloaded),
        intcomma(snapshot.total_files_downloads_count),
        escape_html(&snapshot.total_dataset_downloaded_size),
        intcomma(snapshot.total_dataset_uploaded_count),
        escape_html(&snapshot.total_dataset_uploaded_size),
    )
}

/// Embedded Chart.js line chart of downloads and unique users over time.
/// Labels and series are JSON-encoded, never raw-interpolated.
fn trend_chart(labels: &[String], downloads: &[u64], users: &[u64]) -> String {
    let labels_json = serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string());
    let downloads_json = serde_json::to_string(downloads).unwrap_or_else(|_| "[]".to_string());
    let users_json = serde_json::to_string(users).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"<h3>TREND</h3>
<canvas id="combinedChart" style="width:100%;height:200px;"></canvas>
<script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
<script>
new Chart("combinedChart", {{
    type: "line",
    data: {{
        labels: {labels_json},
        datasets: [
            {{
                label: 'Total Downloads',
                data: {downloads_json},
                borderColor: "red",
                fill: false,
                yAxisID: "y-axis-1"
            }},
            {{
                label: 'Unique Users',
                data: {users_json},
                borderColor: "blue",
                fill: false,
                yAxisID: "y-axis-2"
            }}
        ]
    }},
    options: {{
        responsive: false,
        maintainAspectRatio: false,
        legend: {{ display: true }},
        title: {{ display: true, text: "Total Downloads and Unique Users Over Time" }}
    }}
}});
</script>
"#
    )
}

fn glossary_section() -> String {
    let mut out = String::new();
    out.push_str("<h2>Understanding the Metrics:</h2>\n<div style='text-align: justify;'>\n");
    out.push_str(
        "<p><em>This report includes several key metrics that provide insight into the usage \
         patterns of the service. Here's a brief explanation of these metrics:</em></p>\n<ul>\n",
    );
    for (term, definition) in GLOSSARY {
        out.push_str(&format!(
            "<li><strong>{}:</strong> {}</li>\n",
            escape_html(term),
            escape_html(definition),
        ));
    }
    out.push_str("</ul>\n</div>\n");
    out
}

fn footer(ctx: &ReportContext) -> String {
    let mut out = String::new();
    out.push_str("<hr style=\"border: 1px solid #ccc; margin-top: 20px;\">\n");
    out.push_str("<p style=\"font-size: 0.8em; color: #666;\">\n");
    out.push_str(&format!(
        "This email ({}) is auto-generated and might contain confidential data.",
        escape_html(&ctx.filename),
    ));
    if let Some(link) = &ctx.download_link {
        out.push_str(&format!(
            " You can download the complete CSV logs for your own analysis from \
             <a href='{}' style=\"color: #666;\">here</a>; this link auto-expires in \
             {LINK_EXPIRY_DAYS} days.",
            escape_html(link),
        ));
    }
    out.push_str(" If you have any other queries, please reply to this email.\n<br>\n</p>\n");
    out
}
