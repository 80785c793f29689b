mod adapters;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use arbiter_kernel::AuthorityBuilder;
use arbiter_kernel::protocol::{AuthorityConfig, CallRequest, CallerKind, ModuleId, SessionId};
use clap::Parser;
use futures_util::StreamExt;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "arbiterd")]
#[command(about = "Arbiter authority demo daemon")]
struct Cli {
    /// JSON authority configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `default_timeout_ms`.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Overrides `max_chronicle_entries`.
    #[arg(long)]
    capacity: Option<usize>,
    #[arg(long, default_value = ".arbiter/chronicle.jsonl")]
    export: PathBuf,
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = load_config(&cli).await?;
    let mut builder = AuthorityBuilder::new(config);
    for adapter in adapters::all() {
        builder = builder.register_adapter(adapter);
    }
    let authority = builder.build().context("building authority")?;

    let mut appended = authority.chronicle().subscribe_stream();
    let stream_task = tokio::spawn(async move {
        while let Some(item) = appended.next().await {
            match item {
                Ok(entry) => info!(
                    index = entry.index,
                    route = %entry.entry.summary.route,
                    success = entry.entry.success,
                    entry_hash = %entry.entry_hash.prefix(12),
                    "chronicle.appended"
                ),
                Err(error) => warn!(%error, "chronicle stream lagged"),
            }
        }
    });

    let session = SessionId::new_uuid();
    let text = "Revenue grew in every region this quarter, \
                led by a strong rebound in the northern markets.";
    let calls = vec![
        CallRequest::new(
            session.clone(),
            CallerKind::Agent,
            ModuleId::Muse,
            "suggest",
            json!({"theme": "growth"}),
        )
        .with_seed(7),
        CallRequest::new(
            session.clone(),
            CallerKind::Human,
            ModuleId::Oracle,
            "analyze",
            json!({ "text": text }),
        ),
        CallRequest::new(
            session.clone(),
            CallerKind::Agent,
            ModuleId::Muse,
            "compose",
            json!({"theme": "growth"}),
        )
        .with_seed(7),
        CallRequest::new(
            session.clone(),
            CallerKind::System,
            ModuleId::Scribe,
            "render",
            json!({"context": {"title": "Q3 review", "tone": "plain"}}),
        )
        .with_version("0.9.0"),
    ];

    for request in calls {
        let response = authority.call(request).await;
        match &response.error {
            None => info!(
                route = %response.audit.route,
                duration_ms = response.audit.duration_ms,
                result = %response.result.clone().unwrap_or_default(),
                "call succeeded"
            ),
            Some(error) => info!(
                route = %response.audit.route,
                code = %error.code,
                recoverable = error.recoverable,
                message = %error.message,
                "call rejected"
            ),
        }
    }
    let garbage = authority.call("{\"module\": \"ORACLE\"").await;
    info!(code = ?garbage.error_code(), "malformed input rejected");

    let report = authority.replay_all(false).await;
    info!(
        replayed = report.replayed,
        matched = report.matched,
        mismatched = report.mismatched,
        "replay finished"
    );

    authority
        .verify_chronicle()
        .context("chronicle failed verification")?;
    let stats = authority.chronicle_stats();
    info!(
        total = stats.total,
        success_rate = stats.success_rate,
        mean_duration_ms = stats.mean_duration_ms,
        "chronicle verified"
    );

    let written = authority
        .chronicle()
        .export_to_file(&cli.export)
        .await
        .with_context(|| format!("exporting chronicle to {}", cli.export.display()))?;
    info!(path = %cli.export.display(), entries = written, "chronicle exported");

    tokio::time::sleep(Duration::from_millis(50)).await;
    stream_task.abort();
    if let Err(error) = stream_task.await {
        warn!(%error, "chronicle stream task stopped");
    }

    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

async fn load_config(cli: &Cli) -> Result<AuthorityConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config {}", path.display()))?;
            AuthorityConfig::from_json_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => AuthorityConfig::default(),
    };
    if let Some(timeout_ms) = cli.timeout_ms {
        config.default_timeout_ms = timeout_ms;
    }
    if let Some(capacity) = cli.capacity {
        config.max_chronicle_entries = capacity;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}
