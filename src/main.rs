use anyhow::{Context, Result};
use clap::Parser;
use houjin_import::{
    config::Args,
    import::{run_import, PreparedInput},
    load::{DryRunSink, ImportStats, PgUpsertSink, UpsertStatement},
    report::{write_summary, ImportSummary},
    schema::ensure_table,
};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve configuration ────────────────────────────────────
    let (config, db) = Args::parse().resolve()?;
    info!(
        path = %config.csv_path.display(),
        table = %config.table,
        layout = ?config.layout,
        encoding = config.encoding.name(),
        batch_size = config.batch_size,
        type_codes = ?config.filter.accepted(),
        dry_run = config.dry_run,
        "startup"
    );
    let start = Instant::now();

    // ─── 3) read the input before touching the database ──────────────
    let input = PreparedInput::read(&config)?;

    // ─── 4) run against the database, or a counting sink ─────────────
    let stats: ImportStats = if config.dry_run {
        let (stats, sink) = run_import(&config, &input, DryRunSink::default()).await?;
        info!(records = sink.records, "dry run; nothing written");
        stats
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(db.connect_options())
            .await
            .with_context(|| {
                format!(
                    "connecting to postgres at {}:{}/{} as {}",
                    db.host, db.port, db.database, db.user
                )
            })?;

        let plan = ensure_table(&pool, &config.table, input.layout, input.roles.key).await?;
        info!(
            added = plan.additions.len(),
            mismatched = plan.mismatches.len(),
            "schema ready"
        );

        let statement = UpsertStatement::new(&config.table, input.layout, input.roles.key);
        let sink = PgUpsertSink::new(pool.clone(), statement);
        let (stats, _) = run_import(&config, &input, sink).await?;
        pool.close().await;
        stats
    };

    // ─── 5) report ───────────────────────────────────────────────────
    stats.log_summary();
    if stats.batches_failed > 0 {
        warn!(
            failed_batches = stats.batches_failed,
            failed_records = stats.records_failed,
            "some batches were not written"
        );
    }
    if let Some(path) = &config.summary {
        write_summary(path, &ImportSummary::new(&config, input.layout, &stats))?;
    }

    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}
