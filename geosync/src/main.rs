mod config;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{Config, StorageConfig};
use monitor::envelope::{Envelope, SubscriptionPayload};
use monitor::notify::{HttpTopicNotifier, Notifier, StdoutNotifier};
use monitor::report::RunReport;
use pipeline::geocode::Geocoder;
use pipeline::run::Pipeline;
use pipeline::sources::{CampaignClient, SheetClient};
use pipeline::store::{FeatureStore, FilesystemStore, HttpObjectStore};

#[derive(Parser)]
#[command(name = "geosync", about = "Synchronizes event and affiliate data into geocoded GeoJSON datasets")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run configured synchronization jobs.
    Sync {
        /// Run only the named job instead of all of them.
        #[arg(long)]
        job: Option<String>,
        /// Print the merged dataset instead of publishing it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Report completed runs from a delivered log payload.
    Monitor {
        /// Path to a JSON file holding the subscription payload.
        #[arg(long)]
        payload: PathBuf,
        /// Print reports instead of posting them to the topic.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("cannot read configuration file {}", cli.config.display()))?;
    let config: Config = serde_yaml::from_str(&raw).context("cannot parse configuration")?;
    config.validate().context("invalid configuration")?;
    init_metrics(&config)?;

    match cli.command {
        Command::Sync { job, dry_run } => run_sync(config, job, dry_run).await,
        Command::Monitor { payload, dry_run } => run_monitor(config, &payload, dry_run).await,
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("required environment variable {name} not set"))
}

fn init_metrics(config: &Config) -> anyhow::Result<()> {
    let Some(metrics_config) = &config.metrics else {
        return Ok(());
    };
    let recorder = StatsdBuilder::from(metrics_config.statsd_host.as_str(), metrics_config.statsd_port)
        .build(Some("geosync"))
        .context("cannot build statsd exporter")?;
    metrics::set_global_recorder(recorder)
        .map_err(|err| anyhow::anyhow!("cannot install metrics recorder: {err}"))?;
    for def in pipeline::metrics_defs::ALL_METRICS {
        metrics::describe_counter!(def.name, def.description);
    }
    Ok(())
}

fn build_pipeline(config: &Config, dry_run: bool) -> anyhow::Result<Pipeline> {
    let sheets = SheetClient::new(
        &config.spreadsheet.base_url,
        require_env(&config.spreadsheet.api_key_env)?,
    );

    let campaigns = match &config.campaign {
        Some(campaign) => Some(CampaignClient::new(
            &campaign.base_url,
            require_env(&campaign.token_env)?,
        )),
        None => None,
    };

    let mut geocoder = Geocoder::new(
        &config.geocoder.base_url,
        require_env(&config.geocoder.token_env)?,
        config.geocoder.countries.clone(),
        config.geocoder.types.clone(),
    );
    if let Some(threshold) = config.geocoder.relevance_threshold {
        geocoder = geocoder.with_relevance_threshold(threshold);
    }
    if let Some(delay_ms) = config.geocoder.call_delay_ms {
        geocoder = geocoder.with_call_delay(Duration::from_millis(delay_ms));
    }

    let store: Box<dyn FeatureStore> = match &config.storage {
        StorageConfig::Filesystem { base_dir } => Box::new(FilesystemStore::new(base_dir)),
        StorageConfig::Http {
            public_base_url,
            upload_base_url,
            token_env,
        } => {
            let token = token_env.as_deref().map(require_env).transpose()?;
            Box::new(HttpObjectStore::new(public_base_url, upload_base_url, token))
        }
    };

    Ok(Pipeline {
        sheets,
        campaigns,
        geocoder,
        store,
        dry_run,
    })
}

async fn run_sync(config: Config, job_filter: Option<String>, dry_run: bool) -> anyhow::Result<()> {
    if let Some(name) = &job_filter {
        if !config.jobs.iter().any(|job| &job.name == name) {
            bail!("unknown job {name}");
        }
    }

    let pipeline = build_pipeline(&config, dry_run)?;
    let mut failed = 0;
    for job in config
        .jobs
        .iter()
        .filter(|job| job_filter.as_deref().is_none_or(|name| name == job.name))
    {
        if let Err(err) = pipeline.run(job).await {
            error!(job = %job.name, error = %err, "sync failed");
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

async fn run_monitor(config: Config, payload_path: &Path, dry_run: bool) -> anyhow::Result<()> {
    let monitor_config = config
        .monitor
        .as_ref()
        .context("no monitor section in configuration")?;

    let raw = std::fs::read_to_string(payload_path)
        .with_context(|| format!("cannot read payload file {}", payload_path.display()))?;
    let payload: SubscriptionPayload =
        serde_json::from_str(&raw).context("cannot parse payload file")?;
    let envelope = Envelope::from_payload(&payload).context("cannot decode log envelope")?;

    let notifier: Box<dyn Notifier> = if dry_run {
        Box::new(StdoutNotifier)
    } else {
        Box::new(HttpTopicNotifier::new(&monitor_config.topic_url))
    };

    for request_id in envelope.request_ids()? {
        let events = envelope
            .events_for_request(&request_id)
            .into_iter()
            .cloned()
            .collect();
        let report = RunReport::analyze(&monitor_config.service_name, &request_id, events);
        notifier.publish(&report).await?;
        info!(%request_id, status = report.status().as_str(), "run reported");
    }
    Ok(())
}
