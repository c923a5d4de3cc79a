// # cdnctl - CDN distribution CLI
//
// Thin integration layer over cdn-core. It does not reconcile, retry or
// diff anything itself; it only:
//
// 1. Reads configuration from flags and environment variables
// 2. Registers state stores and providers
// 3. Runs one `deploy` or `remove` through the DistributionEngine
// 4. Prints the output record
//
// ## Configuration
//
// | Flag              | Environment            | Default            |
// |-------------------|------------------------|--------------------|
// | `--name`          | `CDN_NAME`             | (required)         |
// | `--state-store`   | `CDN_STATE_STORE_TYPE` | `file`             |
// | `--state-path`    | `CDN_STATE_STORE_PATH` | `.cdn/state.json`  |
// | `--region`        | `CDN_REGION`           | from inputs/state  |
// | `--log-level`     | `CDN_LOG_LEVEL`        | `info`             |
// | `deploy --inputs` | `CDN_INPUTS`           | (required)         |
//
// AWS credentials come from the standard provider chain.
//
// ## Example
//
// ```bash
// cat > site.json <<'EOF'
// { "origins": [{ "url": "https://mybucket.s3.amazonaws.com", "private": true }] }
// EOF
//
// cdnctl --name website deploy --inputs site.json
// cdnctl --name website remove
// ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use cdn_core::config::{DEFAULT_REGION, DistributionInputs};
use cdn_core::{
    CdnConfig, DistributionEngine, EngineEvent, ProviderConfig, ProviderRegistry, RemoveOutcome,
    StateStoreConfig,
};
use clap::{Parser, Subcommand};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Success
/// - 1: Configuration error
/// - 2: Runtime error (provider, state store)
#[derive(Debug, Clone, Copy)]
enum CdnExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<CdnExitCode> for ExitCode {
    fn from(code: CdnExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "cdnctl")]
#[command(about = "Deploy and remove CDN distributions declaratively", long_about = None)]
struct Cli {
    /// Logical name of the distribution in the state store
    #[arg(short, long, env = "CDN_NAME", global = true)]
    name: Option<String>,

    /// State store type (file, memory)
    #[arg(long = "state-store", env = "CDN_STATE_STORE_TYPE", default_value = "file", global = true)]
    state_store_type: String,

    /// State file path (file store only)
    #[arg(long, env = "CDN_STATE_STORE_PATH", default_value = ".cdn/state.json", global = true)]
    state_path: PathBuf,

    /// Provider region; overrides the region in inputs or state
    #[arg(long, env = "CDN_REGION", global = true)]
    region: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CDN_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update the distribution to match an inputs file
    Deploy {
        /// JSON file with origins, enabled, comment, defaults and region
        #[arg(short, long, env = "CDN_INPUTS")]
        inputs: PathBuf,
    },
    /// Delete the distribution, disabling it first if needed
    Remove,
}

/// Validated invocation
#[derive(Debug)]
struct Invocation {
    name: String,
    state_store: StateStoreConfig,
    region: Option<String>,
    log_level: Level,
    command: Commands,
}

impl Invocation {
    fn from_cli(cli: Cli) -> Result<Self> {
        let name = cli
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .context("--name (or CDN_NAME) is required")?;

        let state_store = match cli.state_store_type.as_str() {
            "file" => StateStoreConfig::File {
                path: cli.state_path.to_string_lossy().into_owned(),
            },
            "memory" => StateStoreConfig::Memory,
            other => anyhow::bail!(
                "CDN_STATE_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };
        state_store.validate()?;

        let log_level = match cli.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            other => anyhow::bail!(
                "CDN_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            ),
        };

        if let Some(region) = &cli.region
            && region.trim().is_empty()
        {
            anyhow::bail!("CDN_REGION cannot be empty");
        }

        Ok(Self {
            name,
            state_store,
            region: cli.region,
            log_level,
            command: cli.command,
        })
    }
}

fn load_inputs(path: &Path) -> Result<DistributionInputs> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inputs file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse inputs file {}", path.display()))
}

fn main() -> ExitCode {
    let invocation = match Invocation::from_cli(Cli::parse()) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return CdnExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(invocation.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CdnExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CdnExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(invocation)).into()
}

async fn run(invocation: Invocation) -> CdnExitCode {
    let registry = ProviderRegistry::new();
    registry.register_builtin_state_stores();

    #[cfg(feature = "cloudfront")]
    cdn_provider_cloudfront::register(&registry);

    let inputs = match &invocation.command {
        Commands::Deploy { inputs } => match load_inputs(inputs) {
            Ok(mut inputs) => {
                if let Some(region) = &invocation.region {
                    inputs.region = region.clone();
                }
                Some(inputs)
            }
            Err(e) => {
                error!("{:#}", e);
                return CdnExitCode::ConfigError;
            }
        },
        Commands::Remove => None,
    };

    match execute(&registry, &invocation, inputs).await {
        Ok(()) => CdnExitCode::Success,
        Err(e) if is_config_error(&e) => {
            error!("Configuration error: {:#}", e);
            CdnExitCode::ConfigError
        }
        Err(e) => {
            error!("{} failed: {:#}", invocation.name, e);
            CdnExitCode::RuntimeError
        }
    }
}

fn is_config_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<cdn_core::Error>(),
        Some(cdn_core::Error::Config(_))
    ) || err
        .downcast_ref::<cdn_core::Error>()
        .is_some_and(cdn_core::Error::is_input_error)
}

async fn execute(
    registry: &ProviderRegistry,
    invocation: &Invocation,
    inputs: Option<DistributionInputs>,
) -> Result<()> {
    let store = registry.create_state_store(&invocation.state_store).await?;
    let previous = store.get_state(&invocation.name).await?;

    // Remove has no inputs: talk to the region the distribution was deployed from
    let region = invocation
        .region
        .clone()
        .or_else(|| inputs.as_ref().map(|i| i.region.clone()))
        .or_else(|| previous.as_ref().map(|s| s.region.clone()))
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let config = CdnConfig {
        provider: ProviderConfig::cloudfront(region),
        state_store: invocation.state_store.clone(),
        ..CdnConfig::default()
    };
    config.validate()?;

    info!(
        "Using provider {} and {} state store",
        config.provider.type_name(),
        config.state_store.type_name()
    );
    let provider = registry.create_provider(&config.provider).await?;

    let (engine, mut events) = DistributionEngine::new(provider, store, config.engine)?;
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let result = match inputs {
        Some(inputs) => engine
            .deploy(&invocation.name, &inputs)
            .await
            .map(|state| {
                println!("{}", state.output(&invocation.name));
            }),
        None => engine.remove(&invocation.name).await.map(|outcome| match outcome {
            RemoveOutcome::Deleted => info!("{} deleted", invocation.name),
            RemoveOutcome::Disabled => info!(
                "{} disabled; run remove again once the change has propagated",
                invocation.name
            ),
            RemoveOutcome::Skipped => info!("{} is not deployed", invocation.name),
        }),
    };

    drop(engine);
    let _ = event_log.await;

    result.map_err(Into::into)
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::DistributionCreated { name, id, url } => {
            info!("{}: created distribution {} at {}", name, id, url)
        }
        EngineEvent::DistributionUpdated { name, id } => {
            info!("{}: updated distribution {}", name, id)
        }
        EngineEvent::DistributionUnchanged { name, id } => {
            info!("{}: distribution {} is up to date", name, id)
        }
        EngineEvent::PassRetried { name, attempt } => {
            info!("{}: concurrent modification, retrying (attempt {})", name, attempt)
        }
        other => tracing::debug!("{:?}", other),
    }
}
