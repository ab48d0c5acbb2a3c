// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Resolve settings (defaults, config file, .env, CLI flags)
// 3. Load the override store and the resource table
// 4. Run the requested mode and write status back to the table
// 5. Print the report and exit with the proper code
//    (0 = success, 1 = broken links, 2 = error)
//
// Logs go to stderr so stdout only carries the report.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;
use resource_link_guardian::checker::HttpProber;
use resource_link_guardian::config::{Settings, TOKEN_ENV};
use resource_link_guardian::engine::{Mode, Orchestrator, ValidationRun};
use resource_link_guardian::overrides::OverrideRegistry;
use resource_link_guardian::report::{self, MachineReporter, Reporter};
use resource_link_guardian::table::ResourceTable;
use resource_link_guardian::throttle::RateLimiter;

/// Log filter override, e.g. `LINK_GUARDIAN_LOG=resource_link_guardian=debug`
const LOG_ENV: &str = "LINK_GUARDIAN_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = every checked resource is fine
//   Ok(1) = at least one resource failed
//   Err   = bad input or an I/O problem (exit 2)
async fn run(cli: Cli) -> Result<i32> {
    // .env is optional; a missing file is not an error
    dotenvy::dotenv().ok();

    let mut settings = Settings::load(cli.config.as_deref())
        .context("failed to load settings")?
        .with_token(std::env::var(TOKEN_ENV).ok());

    if let Some(table) = cli.table {
        settings.table = table;
    }
    if let Some(overrides) = cli.overrides {
        settings.overrides = overrides;
    }
    if let Some(concurrency) = cli.concurrency {
        settings.pool.concurrency = concurrency;
    }
    settings.validate().context("invalid settings")?;

    let mode = cli.command.into_mode();
    let machine = cli.json || matches!(mode, Mode::Ci(_));

    let overrides = if cli.ignore_overrides {
        info!("ignoring the override store for this run");
        OverrideRegistry::empty()
    } else {
        OverrideRegistry::load(&settings.overrides)?
    };

    let prober = HttpProber::new(&settings.probe).context("failed to build HTTP client")?;
    let engine = Orchestrator::new(prober, report::for_format(machine))
        .with_overrides(overrides)
        .with_limiter(RateLimiter::for_token(settings.has_token(), settings.general_budget))
        .with_backoff(settings.backoff.clone())
        .with_pool(settings.pool.clone());

    let run = match &mode {
        // Single-URL checks never touch the table
        Mode::Single(target) => engine.run_single(target).await?,
        _ => {
            let mut table = ResourceTable::load(&settings.table)?;
            let run = engine.run(&mode, &mut table).await?;
            if cli.dry_run {
                info!("dry run, resource table left unchanged");
            } else {
                table.save()?;
            }
            run
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    engine.report(&run, &mut out).context("failed to print report")?;
    out.flush()?;

    let output = cli
        .output
        .or_else(|| matches!(mode, Mode::Ci(_)).then(|| settings.ci_output.clone()));
    if let Some(path) = output {
        write_machine_report(&run, &path)?;
    }

    Ok(if run.success() { 0 } else { 1 })
}

fn write_machine_report(run: &ValidationRun, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    MachineReporter
        .render(run, &mut writer)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush()?;
    info!(path = %path.display(), "wrote JSON report");
    Ok(())
}

// -v raises the default level, LINK_GUARDIAN_LOG overrides everything
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };

    let result = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .with_env_var(LOG_ENV)
                .from_env_lossy(),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: could not initialise logging: {}", e);
    }
}
