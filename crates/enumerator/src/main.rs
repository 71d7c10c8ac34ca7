//! usb-enum
//!
//! Runs one USB discovery pass and prints every device identity found.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::{DiscoveryCommand, DiscoveryEvent, RegistryBridge, create_registry_bridge, setup_logging};
use enumerator::config::{BackendKind, EnumeratorConfig, OutputFormat};
use enumerator::create_backend;
use enumerator::worker::spawn_discovery_worker;
use identity::{DeviceIdentity, PassSummary};
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "usb-enum")]
#[command(author, version, about = "List USB devices from the device tree")]
#[command(long_about = "
Walks /dev/usb/<vid>.<pid>/<instance>, resolves each instance to its
/devices node and prints the identity derived from the node's properties.

EXAMPLES:
    # List devices with the default configuration
    usb-enum

    # JSON output, one object per line
    usb-enum --json

    # Offline run against a captured tree
    usb-enum --dev-usb-root ./dev/usb --devices-root ./devices --snapshot ./props

CONFIGURATION:
    The configuration is looked up in the following order:
    1. Path specified with --config
    2. ~/.config/devtree-usb/enumerator.toml
    3. /etc/devtree-usb/enumerator.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enumeration backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Print identities as JSON lines
    #[arg(long)]
    json: bool,

    /// Namespace root to walk
    #[arg(long, value_name = "DIR")]
    dev_usb_root: Option<PathBuf>,

    /// Device-tree root that witness links resolve into
    #[arg(long, value_name = "DIR")]
    devices_root: Option<PathBuf>,

    /// Read node properties from a snapshot directory
    #[arg(long, value_name = "DIR")]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = EnumeratorConfig::default();
        let path = EnumeratorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        EnumeratorConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        EnumeratorConfig::load_or_default()
    };
    apply_overrides(&mut config, &args);
    config.expand_paths();
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.general.log_level).context("Failed to setup logging")?;
    info!("usb-enum v{}", env!("CARGO_PKG_VERSION"));

    let backend = create_backend(&config).context("Failed to create USB backend")?;

    let (bridge, worker) = create_registry_bridge();
    let worker_handle =
        spawn_discovery_worker(backend, worker).context("Failed to spawn discovery worker")?;

    let result = scan(&bridge, config.general.output).await;

    if let Err(e) = bridge.send_command(DiscoveryCommand::Shutdown).await {
        error!("Error shutting down discovery worker: {:#}", e);
    }
    if let Err(e) = worker_handle.join() {
        error!("Discovery worker thread panicked: {:?}", e);
    }

    let summary = result?;
    eprintln!(
        "{} device(s), {} discarded, {} instance(s) skipped",
        summary.devices,
        summary.discarded,
        summary.instances_skipped + summary.groups_skipped
    );
    Ok(())
}

fn apply_overrides(config: &mut EnumeratorConfig, args: &Args) {
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(backend) = args.backend {
        config.general.backend = backend;
    }
    if args.json {
        config.general.output = OutputFormat::Json;
    }
    if let Some(root) = &args.dev_usb_root {
        config.discovery.dev_usb_root = root.clone();
    }
    if let Some(root) = &args.devices_root {
        config.discovery.devices_root = root.clone();
    }
    if let Some(root) = &args.snapshot {
        config.discovery.snapshot_root = Some(root.clone());
    }
}

/// Run one pass and print identities as they arrive
async fn scan(bridge: &RegistryBridge, output: OutputFormat) -> Result<PassSummary> {
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    bridge
        .send_command(DiscoveryCommand::Scan { response: tx })
        .await
        .context("Failed to send Scan command")?;

    let outcome = loop {
        tokio::select! {
            biased;
            event = bridge.recv_event() => match event {
                Ok(event) => handle_event(event, output)?,
                Err(e) => {
                    debug!("Event channel closed: {}", e);
                    break (&mut rx).await;
                }
            },
            outcome = &mut rx => break outcome,
        }
    };

    while let Some(event) = bridge.try_recv_event() {
        handle_event(event, output)?;
    }

    let outcome = outcome.context("Discovery worker dropped the scan")?;
    outcome.map_err(|e| anyhow!(common::Error::Discovery(e)).context("No devices found"))
}

fn handle_event(event: DiscoveryEvent, output: OutputFormat) -> Result<()> {
    match event {
        DiscoveryEvent::DeviceFound(identity) => print_identity(&identity, output),
        DiscoveryEvent::PassComplete(summary) => {
            debug!("pass complete: {:?}", summary);
            Ok(())
        }
    }
}

fn print_identity(identity: &DeviceIdentity, output: OutputFormat) -> Result<()> {
    println!("{}", format_identity(identity, output)?);
    Ok(())
}

fn format_identity(identity: &DeviceIdentity, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Text => Ok(format!(
            "Bus {:03} Device {:03} Session {} Speed {} Configs {} Node {}",
            identity.bus_number(),
            identity.device_address(),
            identity.session_id(),
            identity.speed(),
            identity.num_configs(),
            identity.node_path()
        )),
        OutputFormat::Json => {
            serde_json::to_string(identity).context("Failed to serialize device identity")
        }
    }
}
