//! ScribeFleet service entry point

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scribe_fleet::application::ports::{
    destroy_leftovers, InputStager, LocalTranscriber, Messenger, Preferences, UpdateSource,
    WorkerProvisioner,
};
use scribe_fleet::application::{
    run_cache_warmer, run_gateway, Intake, RunnerDeps, Scheduler, SchedulerLimits, Timeouts,
    WarmerSettings,
};
use scribe_fleet::cli::app::{load_merged_config, EXIT_ERROR, EXIT_USAGE_ERROR};
use scribe_fleet::cli::config_cmd::handle_config_command;
use scribe_fleet::cli::{Cli, Commands};
use scribe_fleet::domain::config::{AccessPolicy, AppConfig};
use scribe_fleet::infrastructure::provisioning::tfcmd::TfcmdSizing;
use scribe_fleet::infrastructure::remote::keys::public_key_path;
use scribe_fleet::infrastructure::{
    ensure_keypair, EngineCliTranscriber, FilePreferenceStore, FixedAddressProvisioner,
    OpensshChannel, TelegramMessenger, TfcmdProvisioner,
};

/// Engine binary on the local host, for the preliminary fast pass.
const LOCAL_ENGINE: &str = "/opt/scribe-fleet/engine";

/// Remote user on worker VMs.
const WORKER_USERNAME: &str = "root";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Config { action }) = &cli.command {
        return match handle_config_command(*action, cli.config.clone()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err}");
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_merged_config(&cli).await;
    match run_service(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

async fn run_service(config: AppConfig) -> Result<(), u8> {
    let Some(token) = config.bot_token.clone() else {
        error!("a bot token is required (config bot_token or SCRIBE_FLEET_BOT_TOKEN)");
        return Err(EXIT_USAGE_ERROR);
    };

    let policy = AccessPolicy::new(
        config.allowed_submitters.clone().unwrap_or_default(),
        config.allowed_usernames.clone().unwrap_or_default(),
    );
    if policy.is_empty() {
        error!("at least one allowed submitter is required (allowed_submitters or allowed_usernames)");
        return Err(EXIT_USAGE_ERROR);
    }

    let state_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("scribe-fleet");
    let (key_path, generate_key) = match &config.ssh_key_path {
        Some(path) => (PathBuf::from(path), false),
        None => (state_dir.join("id_ed25519"), true),
    };
    if let Err(err) = ensure_keypair(&key_path, generate_key).await {
        error!("SSH key setup failed: {err}");
        return Err(EXIT_ERROR);
    }

    // start from a clean staging area
    let tmp_dir = config.tmp_dir_or_default();
    let _ = tokio::fs::remove_dir_all(&tmp_dir).await;
    if let Err(err) = tokio::fs::create_dir_all(&tmp_dir).await {
        error!(path = %tmp_dir.display(), "failed to create staging dir: {err}");
        return Err(EXIT_ERROR);
    }

    let telegram = Arc::new(TelegramMessenger::new(token));
    let messenger: Arc<dyn Messenger> = telegram.clone();
    let stager: Arc<dyn InputStager> = telegram.clone();
    let updates: Arc<dyn UpdateSource> = telegram.clone();

    let provisioner: Arc<dyn WorkerProvisioner> = match &config.worker_address {
        Some(address) => {
            info!(%address, "using fixed worker address; provisioning disabled");
            Arc::new(FixedAddressProvisioner::new(address.clone()))
        }
        None => {
            let sizing = config.worker.clone().unwrap_or_default();
            Arc::new(TfcmdProvisioner::new(
                public_key_path(&key_path),
                TfcmdSizing {
                    image: sizing
                        .image
                        .unwrap_or_else(|| "scribe-fleet-worker:latest".to_string()),
                    entrypoint: sizing.entrypoint.unwrap_or_else(|| "/sbin/init".to_string()),
                    cpus: sizing.cpus.unwrap_or(4),
                    ram_gb: sizing.ram_gb.unwrap_or(8),
                    rootfs_gb: sizing.rootfs_gb.unwrap_or(20),
                    node_id: sizing.node_id,
                },
            ))
        }
    };

    let local: Arc<dyn LocalTranscriber> = Arc::new(EngineCliTranscriber::new(
        LOCAL_ENGINE,
        config.warm_command_or_default(),
        tmp_dir.join("local"),
    ));

    if config.worker_address.is_none() {
        let cleaned = destroy_leftovers(provisioner.as_ref()).await;
        if cleaned > 0 {
            info!(count = cleaned, "cleaned up leftover workers");
        }
    }

    let scheduler = Arc::new(Scheduler::new(SchedulerLimits {
        global: config.global_limit_or_default(),
        per_submitter: config.per_submitter_limit_or_default(),
    }));
    let deps = Arc::new(RunnerDeps {
        messenger: messenger.clone(),
        provisioner: provisioner.clone(),
        remote: Arc::new(OpensshChannel::new(key_path, WORKER_USERNAME)),
        timeouts: Timeouts {
            job: config.job_timeout(),
            connect_budget: config.connect_timeout(),
            connect_retry: config.connect_retry_interval(),
            command_idle: config.command_idle_timeout(),
        },
    });

    let dispatch = tokio::spawn(scheduler.clone().run(deps.clone()));

    let warmer = if config.worker_address.is_none() {
        Some(tokio::spawn(run_cache_warmer(
            scheduler.clone(),
            deps.clone(),
            local.clone(),
            WarmerSettings {
                poll_interval: config.warmer_poll_interval(),
                idle_threshold: config.warmer_interval(),
                failure_backoff: std::time::Duration::from_secs(60),
                deploy: config.warmer_deploy(),
                warm_command: config.warm_command_or_default(),
            },
        )))
    } else {
        info!("fixed worker address set; cache warmer disabled");
        None
    };

    let intake = Arc::new(Intake {
        scheduler: scheduler.clone(),
        messenger,
        stager,
        preferences: Arc::new(FilePreferenceStore::new(Preferences {
            model: config.default_model_or_default(),
            language: config.default_language_or_default(),
        })),
        local,
        policy,
        defaults: Preferences {
            model: config.default_model_or_default(),
            language: config.default_language_or_default(),
        },
        tmp_dir,
    });
    let gateway = tokio::spawn(run_gateway(intake, updates));

    info!("scribe-fleet is up");
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }

    info!("shutting down");
    scheduler.shutdown();
    gateway.abort();
    if let Some(warmer) = warmer {
        warmer.abort();
    }
    let _ = dispatch.await;

    Ok(())
}
