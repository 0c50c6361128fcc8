//! Geotrack Agent CLI
//!
//! Background location tracking with durable intent.

use clap::{Parser, Subcommand};
use geotrack_agent::{
    notify::format_fix, Config, ConsolePresenter, ReconcileOutcome, ServiceController,
    SimulatedProvider, StateStore, StaticEnvironment, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "geotrack")]
#[command(version = VERSION)]
#[command(about = "Background location tracking agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the durable-state directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking and run the agent in the foreground
    Start {
        /// Sampling interval override in seconds (default 30)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Simulate a disabled positioning provider
        #[arg(long)]
        gps_off: bool,
    },

    /// Durably disable tracking; a running agent stops within a second
    Stop,

    /// Restart reconciliation: resume tracking if it was on before the
    /// process or device went down
    Boot {
        /// Simulate a disabled positioning provider
        #[arg(long)]
        gps_off: bool,
    },

    /// Show durable tracking state and the last recorded position
    Status,

    /// Show configuration
    Config,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            interval_secs,
            gps_off,
        } => cmd_start(cli.data_dir, interval_secs, gps_off),
        Commands::Stop => cmd_stop(cli.data_dir),
        Commands::Boot { gps_off } => cmd_boot(cli.data_dir, gps_off),
        Commands::Status => cmd_status(cli.data_dir),
        Commands::Config => cmd_config(),
    }
}

fn load_config(data_dir: Option<PathBuf>) -> Config {
    let mut config = Config::load().unwrap_or_default();
    if let Some(dir) = data_dir {
        config.data_path = dir;
    }
    config
}

fn open_store(config: &Config) -> Arc<StateStore> {
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: could not create data directory: {e}");
    }
    match StateStore::open(&config.data_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error opening durable state in {:?}: {e}", config.data_path);
            std::process::exit(1);
        }
    }
}

fn build_controller(config: &Config, store: Arc<StateStore>, gps_off: bool) -> ServiceController {
    let environment = if gps_off {
        StaticEnvironment::positioning_disabled()
    } else {
        StaticEnvironment::all_granted()
    };

    ServiceController::new(
        config,
        Arc::new(SimulatedProvider::new(52.520008, 13.404954)),
        Arc::new(environment),
        store,
        Arc::new(ConsolePresenter),
    )
}

fn cmd_start(data_dir: Option<PathBuf>, interval_secs: Option<u64>, gps_off: bool) {
    let mut config = load_config(data_dir);
    if let Some(secs) = interval_secs {
        config.policy.interval_ms = secs * 1000;
        config.policy.min_interval_ms = config.policy.interval_ms / 2;
    }

    println!("Geotrack Agent v{VERSION}");
    println!("  Data directory: {:?}", config.data_path);
    println!("  Sampling interval: {}s", config.policy.interval_ms / 1000);
    println!();

    let store = open_store(&config);
    let mut controller = build_controller(&config, store.clone(), gps_off);

    if let Err(e) = controller.request_start() {
        eprintln!("Error: could not start tracking: {e}");
        std::process::exit(1);
    }

    println!("Tracking started. Press Ctrl+C or run `geotrack stop` to stop.");
    println!();

    run_agent(controller, store);
}

fn cmd_boot(data_dir: Option<PathBuf>, gps_off: bool) {
    let config = load_config(data_dir);
    let store = open_store(&config);
    let mut controller = build_controller(&config, store.clone(), gps_off);

    match controller.reconcile_after_restart() {
        ReconcileOutcome::Idle => {
            println!("Tracking was not enabled; nothing to resume.");
        }
        ReconcileOutcome::Resumed => {
            println!("Tracking resumed after restart.");
            println!();
            run_agent(controller, store);
        }
        ReconcileOutcome::Deferred(failure) => {
            // Desired state is kept; a later boot or manual start resumes.
            println!("Tracking is enabled but could not resume: {failure}");
            println!("It will resume once the environment recovers.");
        }
    }
}

/// Foreground agent loop. Services sampler events and polls the durable
/// intent record so a `geotrack stop` from another process takes effect.
fn run_agent(mut controller: ServiceController, store: Arc<StateStore>) {
    let status = controller.status();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let mut last_intent_check = Instant::now();

    while running.load(Ordering::SeqCst) {
        controller.service_events();

        if !status.is_active() {
            // The session was lost (provider went away). Desired state is
            // untouched; the next boot reconciliation will resume.
            println!("Tracking session ended; run `geotrack boot` to resume.");
            return;
        }

        if last_intent_check.elapsed() >= Duration::from_secs(1) {
            match store.reload_intent() {
                Ok(true) => {}
                Ok(false) => {
                    println!();
                    println!("Stop requested; shutting down.");
                    break;
                }
                Err(e) => eprintln!("Warning: could not re-read tracking intent: {e}"),
            }
            last_intent_check = Instant::now();
        }

        thread::sleep(Duration::from_millis(200));
    }

    controller.request_stop();
}

fn cmd_stop(data_dir: Option<PathBuf>) {
    let config = load_config(data_dir);
    let store = open_store(&config);

    match store.set_intent(false) {
        Ok(()) => println!("Tracking disabled. A running agent will stop within a second."),
        Err(e) => {
            eprintln!("Error: could not disable tracking: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_status(data_dir: Option<PathBuf>) {
    let config = load_config(data_dir);
    let store = open_store(&config);

    println!("Geotrack Agent Status");
    println!("=====================");
    println!();

    if store.tracking_intent() {
        println!("Tracking: ENABLED (will resume after restarts)");
    } else {
        println!("Tracking: STOPPED");
    }

    match store.last_sample() {
        Some(sample) => println!("Last position: {}", format_fix(&sample)),
        None => println!("Last position: none recorded"),
    }

    println!();
    println!("Configuration:");
    println!("  Data directory: {:?}", config.data_path);
    println!("  Sampling interval: {}s", config.policy.interval_ms / 1000);
    println!(
        "  Minimum interval: {}s",
        config.policy.min_interval_ms / 1000
    );
    println!(
        "  Max delivery latency: {}s",
        config.policy.max_latency_ms / 1000
    );
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
