use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use lyricstator_bootstrap_core::{
    platform_library_filename, BootstrapConfig, BootstrapController, BootstrapError,
    BootstrapObserver, DynamicLibraryLoader, LibraryLoadSequencer, PermissionGate, PermissionHost,
    PermissionRequest, PermissionState,
};
use tracing_subscriber::EnvFilter;

fn main() -> lyricstator_bootstrap_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lyricstator bootstrap host");

    match cli.command {
        Commands::Launch {
            manifest,
            library_dir,
            deny_capture,
        } => run_launch(manifest.as_deref(), library_dir, deny_capture),
        Commands::Preflight { manifest, json } => run_preflight(manifest.as_deref(), json),
    }
}

fn run_launch(
    manifest: Option<&Path>,
    library_dir: Option<PathBuf>,
    deny_capture: bool,
) -> lyricstator_bootstrap_core::Result<()> {
    let mut config = load_config(manifest)?;
    if let Some(dir) = library_dir {
        config.libraries.search_dir = Some(dir);
    }
    config.validate()?;

    let loader = match &config.libraries.search_dir {
        Some(dir) => DynamicLibraryLoader::with_search_dir(dir),
        None => DynamicLibraryLoader::new(),
    };
    let mut sequencer = LibraryLoadSequencer::new(Box::new(loader));
    sequencer.configure(config.library_specs())?;

    let host = Arc::new(QueuedPermissionHost::default());
    let gate = PermissionGate::new(host.clone(), config.capture.capability.as_str());
    let mut controller = BootstrapController::new(gate, sequencer, Arc::new(LogObserver));

    let outcome = controller.start();

    // The platform answers permission requests on its own schedule; here the
    // CLI stands in for it once start has returned.
    for request in host.drain() {
        controller.on_permission_result(request.id, !deny_capture);
    }

    let loaded = controller
        .libraries()
        .iter()
        .filter(|spec| spec.loaded)
        .count();
    tracing::info!(
        status = %controller.status(),
        capture = %controller.permission_status(),
        loaded,
        total = controller.libraries().len(),
        "bootstrap finished"
    );
    outcome
}

fn run_preflight(manifest: Option<&Path>, json: bool) -> lyricstator_bootstrap_core::Result<()> {
    let config = load_config(manifest)?;
    config.validate()?;

    if json {
        let report = serde_json::json!({
            "capability": config.capture.capability,
            "search_dir": config.libraries.search_dir,
            "load_order": config
                .libraries
                .names
                .iter()
                .map(|name| {
                    serde_json::json!({
                        "name": name,
                        "file": platform_library_filename(name),
                    })
                })
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("capture capability: {}", config.capture.capability);
    match &config.libraries.search_dir {
        Some(dir) => println!("library search dir: {}", dir.display()),
        None => println!("library search dir: platform default"),
    }
    println!("load order:");
    for (index, name) in config.libraries.names.iter().enumerate() {
        println!(
            "  {}. {} ({})",
            index + 1,
            name,
            platform_library_filename(name)
        );
    }
    Ok(())
}

fn load_config(manifest: Option<&Path>) -> lyricstator_bootstrap_core::Result<BootstrapConfig> {
    match manifest {
        Some(path) => {
            tracing::info!(?path, "loading bootstrap manifest");
            BootstrapConfig::from_json_file(path)
        }
        None => Ok(BootstrapConfig::lyricstator_defaults()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Queues dispatched permission requests so the adapter can answer them
/// after the bootstrap has run, the way a platform callback would arrive.
#[derive(Default)]
struct QueuedPermissionHost {
    queued: Mutex<Vec<PermissionRequest>>,
}

impl QueuedPermissionHost {
    fn drain(&self) -> Vec<PermissionRequest> {
        let mut queued = self
            .queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *queued)
    }
}

impl PermissionHost for QueuedPermissionHost {
    fn dispatch(&self, request: PermissionRequest) {
        tracing::info!(
            id = request.id,
            capability = %request.capability,
            "permission request dispatched"
        );
        self.queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
    }
}

/// Narrates bootstrap milestones into the log.
struct LogObserver;

impl BootstrapObserver for LogObserver {
    fn native_ready(&self) {
        tracing::info!("native code ready, engine may start");
    }

    fn permission_resolved(&self, state: PermissionState) {
        tracing::info!(%state, "capture permission resolved");
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(%error, "bootstrap failed");
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Lyricstator native bootstrap host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Request the capture permission and load the native library chain.
    Launch {
        /// Optional JSON manifest overriding the stock configuration.
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Directory to resolve the native libraries from.
        #[arg(long)]
        library_dir: Option<PathBuf>,
        /// Answer the capture permission request with a denial.
        #[arg(long)]
        deny_capture: bool,
    },
    /// Validate the configuration and print the load plan without loading.
    Preflight {
        /// Optional JSON manifest overriding the stock configuration.
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Emit the plan as JSON.
        #[arg(long)]
        json: bool,
    },
}
