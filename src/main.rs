use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{debug, info, warn};

use sysmark::app::App;
use sysmark::bench::{meter_from_config, BenchmarkSession};
use sysmark::cli::{Cli, Commands, ConfigArgs, HistoryArgs, RunArgs};
use sysmark::config::persistence::ResultsStorage;
use sysmark::config::BenchmarkConfig;
use sysmark::{error, simple, Result, SysmarkError, APP_NAME, LOG_FILE};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tui = matches!(cli.command, Some(Commands::Tui));
    if let Err(e) = init_tracing(cli.verbose, tui) {
        eprintln!("Logging disabled: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", error::user_friendly_message(&e));
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; `-v` raises this crate to debug, `-vv` to trace.
/// The TUI owns the terminal, so it logs to a file instead of stderr.
fn init_tracing(verbose: u8, tui: bool) -> Result<()> {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    let directive = match verbose {
        0 => None,
        1 => Some("sysmark=debug"),
        _ => Some("sysmark=trace"),
    };
    if let Some(directive) = directive {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    if tui {
        let path = log_file_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn log_file_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        SysmarkError::Config("Unable to determine data directory".to_string())
    })?;
    Ok(data_dir.join(APP_NAME).join(LOG_FILE))
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => BenchmarkConfig::config_file_path()?,
    };
    let config = BenchmarkConfig::load_from(&config_path)?;
    debug!(path = %config_path.display(), "configuration loaded");

    match cli.command {
        None => run_console(config, RunArgs::default()).await,
        Some(Commands::Run(args)) => run_console(config, args).await,
        Some(Commands::Tui) => run_tui(config).await,
        Some(Commands::History(args)) => show_history(args),
        Some(Commands::Config(args)) => show_config(&config_path, &config, args),
    }
}

fn new_session(config: BenchmarkConfig) -> Result<BenchmarkSession> {
    let meter = meter_from_config(&config.power);
    Ok(BenchmarkSession::new(config, meter).with_storage(ResultsStorage::new()?))
}

async fn run_console(config: BenchmarkConfig, args: RunArgs) -> Result<()> {
    let mut config = if args.quick { config.into_quick() } else { config };
    if args.no_save {
        config = config.with_save_results(false);
    }

    let subsystems = args.subsystems();
    info!(?subsystems, quick = args.quick, "console run");

    let mut session = new_session(config)?;
    let shutdown = async {
        // No signal handler available: never interrupt
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let summary = simple::run_benchmarks(&mut session, &subsystems, shutdown).await?;
    if summary.interrupted {
        return Err(SysmarkError::Cancelled("interrupted by user".to_string()));
    }
    Ok(())
}

async fn run_tui(config: BenchmarkConfig) -> Result<()> {
    let mut session = new_session(config)?;
    match session.load_history() {
        Ok(loaded) => debug!(loaded, "score history seeded"),
        Err(e) => warn!(error = %e, "could not load saved results"),
    }

    let mut app = App::new(session)?;
    app.run().await
}

fn show_history(args: HistoryArgs) -> Result<()> {
    let storage = ResultsStorage::new()?;

    if args.clear {
        storage.clear_results()?;
        println!("Cleared saved results in {}", storage.results_path().display());
        return Ok(());
    }

    let mut results = match args.subsystem {
        Some(subsystem) => storage.results_for(subsystem)?,
        None => storage.load_results()?,
    };
    let skip = results.len().saturating_sub(args.limit);
    results.drain(..skip);

    simple::print_history(&results);
    Ok(())
}

fn show_config(path: &Path, config: &BenchmarkConfig, args: ConfigArgs) -> Result<()> {
    if args.init {
        if path.exists() {
            println!("Config file already exists: {}", path.display());
        } else {
            config.save_to(path)?;
            println!("Wrote default config to {}", path.display());
        }
    } else {
        println!("# {}", path.display());
    }
    simple::print_config(config)
}
