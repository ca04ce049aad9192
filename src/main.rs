use std::time::Duration;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use s3tally::analytics::models::MetricsSnapshot;
use s3tally::analytics::{analyze, analyze_by_day, enrich, folders, is_reportable_folder, GeoIpService};
use s3tally::athena::{merge_dedup, parse_result_csv, AthenaRunner};
use s3tally::config::Config;
use s3tally::daterange::{DateRange, Frequency};
use s3tally::mail::Mailer;
use s3tally::query;
use s3tally::report::{render_html, render_text, timeframe_of, ReportContext, TrendSeries, LINK_EXPIRY_DAYS};
use s3tally::storage::{delete_prefix, fetch_object, PostgresSink, S3Sink};

/// Months of snapshot history pulled into the trend chart.
const TREND_MONTHS: usize = 5;

#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "lowercase")]
enum Sink {
    S3,
    Postgres,
}

#[derive(Parser)]
#[command(name = "s3tally")]
#[command(about = "Compute and report usage metrics from S3 server access logs", long_about = None)]
struct Cli {
    /// Report period, resolved to the previous complete period.
    #[arg(long, value_enum, default_value = "monthly", conflicts_with = "date_range")]
    frequency: Frequency,

    /// Explicit inclusive period as two YYYY-MM-DD dates.
    #[arg(long = "date_range", num_args = 2, value_names = ["START", "END"])]
    date_range: Option<Vec<String>>,

    /// Where to persist the computed metrics.
    #[arg(long, value_enum, default_value = "s3")]
    out: Sink,

    /// Fetch every log column instead of the curated projection.
    #[arg(long = "select_all")]
    select_all: bool,

    /// Delete transient query metadata objects after the run.
    #[arg(long = "remove_meta")]
    remove_meta: bool,

    /// Delete the ingested raw log objects after the run.
    #[arg(long = "remove_original_logs")]
    remove_original_logs: bool,

    /// Include interaction-based ranking variants in the report.
    #[arg(long = "interaction_metrics")]
    interaction_metrics: bool,

    /// Send the rendered report over SMTP.
    #[arg(long)]
    email: bool,

    /// Debug logging, plus a local dump of the rendered HTML.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env(cli.email)?;

    let range = match &cli.date_range {
        Some(pair) => DateRange::from_explicit(&pair[0], &pair[1])?,
        None => DateRange::from_frequency(cli.frequency),
    };
    info!(start = range.start(), end = range.end(), "resolved report period");

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let athena_client = aws_sdk_athena::Client::new(&aws);
    let s3_client = aws_sdk_s3::Client::new(&aws);

    let runner = AthenaRunner::new(
        athena_client,
        &config.athena.database,
        &config.meta_result_path(),
    );
    let poll = Duration::from_secs(config.athena.poll_interval_secs);
    let timeout = Duration::from_secs(config.athena.timeout_secs);

    // First-run provisioning; both statements are IF NOT EXISTS.
    runner
        .run(&query::create_database(&config.athena.database), poll, timeout)
        .await?;
    runner
        .run(
            &query::create_table(
                &config.athena.database,
                &config.athena.table,
                &config.logs_location,
            ),
            poll,
            timeout,
        )
        .await?;

    let sql = query::fetch_logs(
        &config.athena.database,
        &config.athena.table,
        &range,
        cli.select_all,
    );
    let output = runner.run(&sql, poll, timeout).await?;
    let result_bytes = fetch_object(&s3_client, &output.output_location).await?;
    let new_rows = parse_result_csv(&result_bytes)?;
    info!(rows = new_rows.len(), exec_id = output.exec_id, "materialized query result");

    let sink = match cli.out {
        Sink::S3 => Some(S3Sink::new(
            s3_client.clone(),
            &config.artifact_result_path(),
        )?),
        Sink::Postgres => None,
    };

    // The object storage sink accumulates: reruns for the same period merge
    // with the already archived batch, new rows winning on requestid.
    let records = match &sink {
        Some(sink) => {
            let existing = sink.load_existing_csv(&range).await.unwrap_or_default();
            merge_dedup(existing, new_rows)
        }
        None => new_rows,
    };

    let geoip = GeoIpService::new(config.geoip_db_path.as_deref())?;
    let rows = enrich(records.clone(), &geoip);

    let overall = analyze(&rows, None, cli.interaction_metrics);
    let folder_snapshots: Vec<MetricsSnapshot> = folders(&rows)
        .iter()
        .filter(|name| is_reportable_folder(name.as_str()))
        .map(|name| analyze(&rows, Some(name.as_str()), cli.interaction_metrics))
        .collect();

    let mut download_link = None;
    let mut trend = None;

    match &sink {
        Some(sink) => {
            let keys = sink.upload_table_artifacts(&range, &records).await?;
            sink.upload_snapshot(&range, &overall, &folder_snapshots)
                .await?;
            download_link = Some(
                sink.presign(
                    &keys.csv_gz,
                    Duration::from_secs(LINK_EXPIRY_DAYS * 24 * 60 * 60),
                )
                .await?,
            );

            let history = sink.fetch_historical_snapshots(&range, TREND_MONTHS).await;
            if !history.is_empty() {
                let current_label = range.start_date().format("%b %Y").to_string();
                trend = Some(TrendSeries::from_history(&history, &current_label, &overall));
            }
        }
        None => {
            let daily = analyze_by_day(&rows);
            let postgres = PostgresSink::connect(&config.postgres_url).await?;
            postgres.init().await?;
            postgres.insert_daily(&daily).await?;
        }
    }

    let ctx = ReportContext {
        source_name: config.athena.database.to_uppercase(),
        filename: range.file_stem(),
        timeframe: timeframe_of(&records),
        download_link,
        trend,
    };
    let html = render_html(&overall, &folder_snapshots, &ctx);
    let text = render_text(&overall, &folder_snapshots, &ctx);

    if cli.verbose {
        tokio::fs::write("email_response.html", &html)
            .await
            .context("failed to write email_response.html")?;
        info!("wrote rendered report to email_response.html");
    }

    if cli.remove_meta {
        delete_prefix(&s3_client, &config.meta_result_path()).await?;
    }
    if cli.remove_original_logs {
        delete_prefix(&s3_client, &config.logs_location).await?;
    }

    if cli.email {
        let email_config = config
            .email
            .as_ref()
            .context("email settings are required for --email")?;
        let mailer = Mailer::from_config(email_config)?;
        let subject = format!(
            "[INTERNAL] Your {} Usage Stats Report",
            config.athena.database.to_uppercase()
        );
        mailer.send_report(&subject, &text, &html).await?;
    }

    info!("report run complete");
    Ok(())
}
