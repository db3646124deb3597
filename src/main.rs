use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use padmapper::config::{self, AppConfig};
use padmapper::controller::{ControllerHandle, ControllerSettings};
use padmapper::mapping::{
    BindingTable, LogSink, MappingEngine, MappingEngineHandle, SystemClipboard,
};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; defaults to <config dir>/padmapper/config.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the resolved bindings and exit
    #[arg(long)]
    print_bindings: bool,

    /// Stick and trigger sampling rate
    #[arg(long, value_name = "HZ", default_value_t = 60)]
    poll_hz: u32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.verbose)?;

    let app_config = match cli.config.clone().or_else(config::default_config_path) {
        Some(path) => config::load_or_default(&path).await,
        None => {
            warn!("No config directory on this platform, using defaults");
            AppConfig::default()
        }
    };

    let (bindings, binding_errors) = app_config.bindings();
    let (stick_config, stick_errors) = app_config.stick_config();
    let rejected = binding_errors.len() + stick_errors.len();
    if rejected > 0 {
        warn!("{} configuration entries were rejected, see above", rejected);
    }

    if cli.print_bindings {
        print_bindings(&bindings);
        return Ok(());
    }

    let engine = MappingEngine::new(bindings, stick_config, Box::new(SystemClipboard));

    let mut mapping_handle = MappingEngineHandle::new(app_config.profile.clone());
    let (source_sender, mut observer_receiver) = mapping_handle
        .start(engine, Box::new(LogSink))
        .map_err(|e| eyre!("Failed to start mapping engine: {}", e))?;

    info!("Initializing controller, sampling at {} Hz", cli.poll_hz);
    let controller_settings = ControllerSettings {
        poll_rate_hz: cli.poll_hz,
    };
    let controller_handle = ControllerHandle::spawn(Some(controller_settings), source_sender)
        .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;

    let _observer_task = tokio::spawn(async move {
        while let Some(event) = observer_receiver.recv().await {
            info!("HUD: {}", event.label());
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to wait for Ctrl-C: {}", e))?;
    info!("Ctrl-C received, shutting down");

    mapping_handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Mapping engine did not shut down cleanly: {}", e))?;

    tokio::task::spawn_blocking(move || controller_handle.stop())
        .await
        .map_err(|e| eyre!("Controller shutdown failed: {}", e))?;

    info!("Shutdown complete");
    Ok(())
}

fn print_bindings(bindings: &BindingTable) {
    let mut current_layer = None;
    for (layer, element, entry) in bindings.iter() {
        if current_layer != Some(layer) {
            println!("[{} layer]", layer);
            current_layer = Some(layer);
        }
        let mut line = format!(
            "  {:<24} {}",
            element.name(),
            entry.description.as_deref().unwrap_or("-")
        );
        line.push_str(&format!("  ({}", entry.action));
        if let Some(repeat) = entry.repeat {
            line.push_str(&format!(
                ", repeat {:?}/{:?}",
                repeat.initial_delay, repeat.interval
            ));
        }
        line.push_str(&format!(", {})", entry.trigger_mode));
        println!("{}", line);
    }
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", if verbose { "debug" } else { "info" })
    }
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
