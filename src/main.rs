//! Beam Commander
//!
//! Routes MIDI controllers and OSC messages into the live laser state.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beam_commander::config::{AppConfig, MappingWatcher};
use beam_commander::cue::{CueDocument, CueEngine};
use beam_commander::device::{ControllerDevice, EventSink};
use beam_commander::mapping::{MappingDocument, MappingTable, RawEvent, RuleSource};
use beam_commander::osc;
use beam_commander::paths::AppPaths;
use beam_commander::persistence::{PersistRequest, PersistenceActor};
use beam_commander::router::{Core, RouterActor, RouterOutputs};
use beam_commander::sniffer;
use beam_commander::state::LiveState;

/// Beam Commander - MIDI/OSC control routing for live laser shows
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to config.yaml in the data dir)
    #[arg(short, long, env = "BEAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory holding config, mapping, cues and logs
    #[arg(long, env = "BEAM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print every controller event with what the mapping makes of it
    #[arg(long)]
    sniff: bool,

    /// Print the effective mapping rules and exit
    #[arg(long)]
    dump_mappings: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if args.list_ports {
        sniffer::list_ports_formatted();
        return Ok(());
    }

    let paths = AppPaths::detect(args.data_dir.as_deref());
    paths.ensure_directories()?;
    let _log_guard = init_logging(&args.log_level, &paths.logs_dir)?;

    info!("Starting Beam Commander v{}...", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", paths.data_dir.display());

    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    let config = AppConfig::load_or_default(&config_path).await?;
    let mapping_path = paths.resolve(&config.storage.mapping_file);
    let cues_path = paths.resolve(&config.storage.cues_file);

    if args.dump_mappings {
        let (doc, _) = MappingDocument::load(&mapping_path);
        sniffer::print_mappings(&MappingTable::from_document(&doc));
        return Ok(());
    }

    if args.sniff {
        let (doc, _) = MappingDocument::load(&mapping_path);
        sniffer::run_cli_sniffer(&config.midi, MappingTable::from_document(&doc)).await?;
        return Ok(());
    }

    run_app(config, mapping_path, cues_path, shutdown_signal()).await?;

    info!("Beam Commander shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    mapping_path: PathBuf,
    cues_path: PathBuf,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let persistence = PersistenceActor::spawn(
        mapping_path.clone(),
        cues_path.clone(),
        config.storage.debounce_ms,
    );

    // Core state
    let (doc, report) = MappingDocument::load(&mapping_path);
    let table = MappingTable::from_document(&doc);
    let live = LiveState::new(config.engine.scan_rate, config.engine.smoothing);
    let bank = CueDocument::load(&cues_path, config.engine.cue_bank_size);
    info!(
        "Loaded {} continuous / {} discrete rules, {} of {} cues",
        table.continuous_rules().len(),
        table.discrete_rules().len(),
        bank.populated(),
        bank.size()
    );

    let mut core =
        Core::new(table, live, CueEngine::new(bank)).with_mapping_path(mapping_path.clone());
    if report.source == RuleSource::File && report.repaired {
        core.request_persist(PersistRequest::Mapping(doc));
    }

    // Outputs
    let (feedback_tx, feedback_rx) = mpsc::channel(256);
    let (forward_tx, forward_rx) = mpsc::channel(256);
    let outputs = RouterOutputs {
        feedback: config.midi.feedback.then_some(feedback_tx),
        forward: config.osc.forward_to.map(|_| forward_tx),
        persistence: Some(persistence.clone()),
    };
    let router = RouterActor::spawn(core, outputs, config.engine.tick_hz);

    // Controller
    let sink: EventSink = {
        let router = router.clone();
        Arc::new(move |event: RawEvent| router.raw_event(event))
    };
    let mut device = ControllerDevice::open(&config.midi, config.midi.feedback, sink);
    let feedback_pump = device.spawn_feedback_pump(feedback_rx);

    // Protocol
    let receiver = match osc::spawn_receiver(config.osc.listen, router.clone()).await {
        Ok(task) => Some(task),
        Err(e) => {
            warn!("OSC input disabled: {:#}", e);
            None
        }
    };
    let forwarder = match config.osc.forward_to {
        Some(target) => match osc::spawn_forwarder(target, forward_rx).await {
            Ok(task) => Some(task),
            Err(e) => {
                warn!("OSC forwarding disabled: {:#}", e);
                None
            }
        },
        None => None,
    };

    let _watcher = if config.storage.watch_mapping {
        match MappingWatcher::new(&mapping_path, router.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("Mapping hot reload disabled: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    info!(
        "✅ Ready: {} input(s), feedback {}, OSC {}",
        device.input_names().len(),
        device.output_name().unwrap_or("off"),
        config.osc.listen
    );

    shutdown.await;

    info!("Shutting down...");
    router.shutdown().await;
    if let Err(e) = persistence.flush().await {
        error!("Failed to flush documents: {:#}", e);
    }
    persistence.shutdown();

    device.close();
    feedback_pump.abort();
    if let Some(task) = receiver {
        task.abort();
    }
    if let Some(task) = forwarder {
        task.abort();
    }

    Ok(())
}

fn init_logging(level: &str, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "beam-commander.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
