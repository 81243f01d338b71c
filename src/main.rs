use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stack_backup::config::{self, Config};
use stack_backup::integrations::IntegrationRegistry;
use stack_backup::managers::backup::BackupManager;
use stack_backup::managers::logging::{self, LoggingConfig};
use stack_backup::managers::remote::RemoteTarget;
use stack_backup::managers::restore::{
    self, ReconnectOutcome, RestoreDestination, RestoreManager, RestoreReport, RestoreRequest,
};
use stack_backup::managers::upload::UploadManager;
use stack_backup::utils::command::tool_available;
use stack_backup::utils::s3::S3Store;
use stack_backup::utils::{CommandExecutor, ContainerOperations, ObjectStore, RealDockerOps, RealExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "stack-backup")]
#[command(about = "Backup, upload and restore of stateful project directories", long_about = None)]
#[command(version)]
struct Cli {
    /// Optional TOML configuration file (environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive every project directory that has a data folder
    Backup {
        /// Exit non-zero when any project failed
        #[arg(long)]
        strict: bool,
    },

    /// Upload local archives that are not in the bucket yet
    Upload,

    /// Restore a project from the bucket
    Restore {
        /// Project to restore
        project: String,

        /// Archive file name (defaults to the latest backup)
        archive: Option<String>,

        /// Extract on this host under the restore directory
        #[arg(long, conflicts_with = "remote_host")]
        local: bool,

        /// Relay the archive to another host (e.g. user@example.com)
        #[arg(long, requires = "remote_path")]
        remote_host: Option<String>,

        /// Destination folder on the remote host
        #[arg(long, requires = "remote_host")]
        remote_path: Option<String>,

        /// SSH key file for the remote host
        #[arg(short, long, requires = "remote_host")]
        identity: Option<PathBuf>,

        /// Deploy the project's manifest without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show remote archives of a project, newest first
    List {
        /// Project name
        project: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(config::load_config(cli.config.as_deref())?);

    // Setup logging with file rotation (must keep guard alive)
    let _log_guard = match logging::init_logging(&LoggingConfig::from_config(&config)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_console_logging();
            warn!("File logging disabled: {:#}", e);
            None
        }
    };

    match cli.command {
        Commands::Backup { strict } => handle_backup(config, strict).await,
        Commands::Upload => handle_upload(&config).await,
        Commands::Restore {
            project,
            archive,
            local,
            remote_host,
            remote_path,
            identity,
            yes,
        } => {
            let destination = match remote_host {
                Some(host) => RestoreDestination::Remote(RemoteTarget {
                    host,
                    destination: remote_path.context("--remote-path is required with --remote-host")?,
                    identity_file: identity,
                }),
                None if local => RestoreDestination::Local {
                    root: config.require_restore_dir()?.to_path_buf(),
                },
                None => prompt_destination(&config)?,
            };

            handle_restore(&config, project, archive, destination, yes).await
        }
        Commands::List { project } => handle_list(&config, &project).await,
    }
}

async fn handle_backup(config: Arc<Config>, strict: bool) -> Result<()> {
    if !tool_available("tar") {
        anyhow::bail!("tar not found on PATH; it is required to create archives");
    }

    let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());
    let runtime = Arc::new(RealDockerOps::with_executor(executor.clone(), config.command_timeout()));
    let registry = registry_for(&config);

    let manager = BackupManager::new(config, registry, runtime, executor);
    let summary = manager.run().await?;

    for failed in summary.failed() {
        if let Err(e) = &failed.archive {
            eprintln!("✗ {}: {}", failed.project, e);
        }
    }

    println!(
        "✓ Backup finished: {} archived, {} failed",
        summary.succeeded(),
        summary.failed().len()
    );

    if strict && (!summary.failed().is_empty() || summary.dump_failures() > 0) {
        std::process::exit(1);
    }

    Ok(())
}

async fn handle_upload(config: &Config) -> Result<()> {
    let store = connect_store(config).await?;
    let manager = UploadManager::new(store, config.require_backup_dir()?, &config.storage.key_prefix);

    let summary = manager.run().await?;

    println!(
        "✓ Upload finished: {} uploaded, {} skipped, {} failed",
        summary.uploaded(),
        summary.skipped(),
        summary.failed()
    );

    Ok(())
}

async fn handle_restore(
    config: &Config,
    project: String,
    archive: Option<String>,
    destination: RestoreDestination,
    yes: bool,
) -> Result<()> {
    let required: &[&str] = match destination {
        RestoreDestination::Local { .. } => &["tar"],
        RestoreDestination::Remote(_) => &["scp", "ssh"],
    };
    for tool in required {
        if !tool_available(tool) {
            anyhow::bail!("{} not found on PATH; it is required for this restore", tool);
        }
    }

    let store = connect_store(config).await?;
    let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());
    let runtime = Arc::new(RealDockerOps::with_executor(executor.clone(), config.command_timeout()));
    let registry = registry_for(config);

    let manager = RestoreManager::new(
        store,
        runtime.clone(),
        registry,
        executor,
        &config.storage.key_prefix,
        config.command_timeout(),
    );

    println!("=== Restore project: {} ===\n", project);

    let report = manager
        .run(&RestoreRequest {
            project,
            archive,
            destination,
        })
        .await?;

    print_report(&report);

    if let Some(ReconnectOutcome::ManifestAvailable { manifest }) = &report.reconnect {
        let deploy = yes
            || dialoguer::Confirm::new()
                .with_prompt(format!("Deploy stack {} from {}?", report.project, manifest.display()))
                .default(false)
                .interact()?;

        if deploy {
            match runtime.deploy_stack(&report.project, manifest).await {
                Ok(()) => println!("✓ Stack {} deployed", report.project),
                Err(e) => eprintln!("✗ Failed to deploy stack {}: {:#}", report.project, e),
            }
        } else {
            println!("Run `docker stack deploy -c {} {}` when ready.", manifest.display(), report.project);
        }
    }

    if report.extraction.is_err() {
        std::process::exit(1);
    }

    Ok(())
}

async fn handle_list(config: &Config, project: &str) -> Result<()> {
    let store = connect_store(config).await?;
    let backups = restore::list_backups(store.as_ref(), &config.storage.key_prefix, project).await?;

    if backups.is_empty() {
        eprintln!("No backups found for project: {}", project);
        std::process::exit(1);
    }

    println!("Backups for {} (newest first):", project);
    for object in &backups {
        println!(
            "  {}  {}  ({} bytes)",
            object.last_modified.format("%Y-%m-%d %H:%M:%S"),
            object.file_name(),
            object.size
        );
    }

    Ok(())
}

fn prompt_destination(config: &Config) -> Result<RestoreDestination> {
    use dialoguer::{Input, Select};

    let modes = ["local (this host)", "remote (another host over SSH)"];
    let selection = Select::new()
        .with_prompt("Restore destination")
        .items(&modes)
        .default(0)
        .interact()?;

    if selection == 0 {
        return Ok(RestoreDestination::Local {
            root: config.require_restore_dir()?.to_path_buf(),
        });
    }

    let host: String = Input::new()
        .with_prompt("Remote host (e.g. user@example.com)")
        .interact_text()?;
    let destination: String = Input::new()
        .with_prompt("Remote destination folder")
        .interact_text()?;
    let identity: String = Input::new()
        .with_prompt("SSH key file (optional, press Enter to skip)")
        .allow_empty(true)
        .interact_text()?;

    Ok(RestoreDestination::Remote(RemoteTarget {
        host,
        destination,
        identity_file: (!identity.trim().is_empty()).then(|| PathBuf::from(identity.trim())),
    }))
}

fn print_report(report: &RestoreReport) {
    println!();
    match &report.extraction {
        Ok(()) => println!("✓ Files restored from {}", report.archive),
        Err(e) => eprintln!("✗ Restore of {} failed: {}", report.archive, e),
    }

    for step in &report.databases {
        match &step.result {
            Ok(outcome) => println!("  {}: {:?}", step.integration, outcome),
            Err(e) => eprintln!("  ✗ {}: {}", step.integration, e),
        }
    }

    match &report.reconnect {
        Some(ReconnectOutcome::Redeployed { services }) => {
            println!("✓ Redeployed services: {}", services.join(", "))
        }
        Some(ReconnectOutcome::ManualActionRequired) => {
            println!("⚠ Redeploy the services of {} manually", report.project)
        }
        _ => {}
    }
}

/// Dump/restore steps need the docker CLI; without it they are disabled
fn registry_for(config: &Config) -> IntegrationRegistry {
    if config.integrations.is_empty() {
        return IntegrationRegistry::new();
    }

    if !tool_available("docker") {
        warn!("docker not found on PATH; database dump/restore steps are disabled");
        return IntegrationRegistry::new();
    }

    IntegrationRegistry::from_config(&config.integrations)
}

async fn connect_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let bucket = config.require_bucket()?;
    let region = config.require_region()?;
    let store = S3Store::connect(&config.storage, bucket, region).await?;
    Ok(Arc::new(store))
}
