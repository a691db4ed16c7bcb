use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lifecycle_demo::config::{print_usage, Config};
use lifecycle_demo::scenario::run;

fn main() -> Result<()> {
    let config = Config::from_args();
    if config.show_help {
        print_usage();
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .with_context(|| format!("invalid log filter {:?}", config.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!(e))?;

    info!(
        children = config.children,
        fail = ?config.fail,
        single_use = config.single_use,
        "running lifecycle demo"
    );
    let report = run(&config);

    let mut out = io::stdout().lock();
    for entry in &report.journal {
        writeln!(out, "{:<12} {:<16} {}", entry.component, entry.event, entry.state)
            .context("write journal")?;
    }
    writeln!(out).context("write journal")?;
    for (component, state) in &report.final_states {
        writeln!(out, "{component:<12} ends {state}").context("write final states")?;
    }
    for (phase, error) in &report.failures {
        writeln!(out, "{} failed: {error}", phase.label()).context("write failures")?;
    }
    for (phase, state) in &report.skipped {
        writeln!(out, "{} skipped from {state}", phase.label()).context("write skipped")?;
    }

    Ok(())
}
