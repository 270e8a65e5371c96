use anyhow::{bail, Context};
use chrono::Utc;
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;

mod config;
mod dashboard;
mod error;
mod history;
mod logging;
mod processor;
mod session;
mod stats;

use config::Config;
use dashboard::Dashboard;
use history::{HistoryStore, Processed, ProcessingEntry};
use processor::{Mode, Processor};
use session::Session;
use stats::Stats;

const USAGE: &str = "\
Usage:
  ratelimiter [--no-delay]
      Open the interactive dashboard.

  ratelimiter --process <mode> <text...> [--json] [--no-delay]
      Process a single text and print the result.

Modes: uppercase, reverse, count, hash, md5, word_frequency";

#[derive(Debug, PartialEq)]
enum Command {
    Dashboard,
    Process { mode: Mode, text: String, json: bool },
    Help,
}

#[derive(Debug, PartialEq)]
struct Options {
    command: Command,
    no_delay: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut no_delay = false;
    let mut json = false;
    let mut help = false;
    let mut process = false;
    let mut rest: Vec<&str> = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--no-delay" => no_delay = true,
            "--json" => json = true,
            "--process" => process = true,
            "-h" | "--help" => help = true,
            other if other.starts_with("--") => bail!("unknown option: {}", other),
            other => rest.push(other),
        }
    }

    let command = if help {
        Command::Help
    } else if process {
        // First positional is the mode, everything after it is the text
        let Some((mode, words)) = rest.split_first() else {
            bail!("--process needs a mode and some text");
        };
        Command::Process {
            mode: mode.parse()?,
            text: words.join(" "),
            json,
        }
    } else if let Some(stray) = rest.first() {
        bail!("unexpected argument: {}", stray);
    } else {
        Command::Dashboard
    };

    Ok(Options { command, no_delay })
}

#[derive(Serialize)]
struct Report<'a> {
    entry: Option<&'a ProcessingEntry>,
    stats: Stats,
}

fn run_once(
    runtime: &Runtime,
    session: &Session,
    completions: &mut UnboundedReceiver<Processed>,
    mode: Mode,
    text: String,
    json: bool,
) -> anyhow::Result<()> {
    // ? converts ProcessError into anyhow::Error
    session.submit_processing(text, mode)?;
    // block_on waits here for the spawned task to report back
    let processed = runtime
        .block_on(completions.recv())
        .context("processing ended without a result")?;

    if json {
        let history = session.history();
        let report = Report {
            entry: history.first(),
            stats: session.stats(Utc::now()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", processed.output);
        eprintln!("{} in {}ms", processed.mode, processed.processing_time);
    }

    Ok(())
}

// main can return Result; an Err is printed with its context chain
fn main() -> anyhow::Result<()> {
    // skip(1) drops the program name
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {:#}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    if options.command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    // The guard flushes buffered log lines when it goes out of scope at the end of main
    let _log_guard =
        logging::init_logging(&Config::config_dir()).context("failed to set up logging")?;

    let mut config = Config::load();
    if options.no_delay {
        config.simulate_delay = false;
    }
    tracing::debug!(?config, "configuration loaded");

    // The dashboard loop stays synchronous; processing tasks run on this runtime
    let runtime = Runtime::new().context("failed to start the async runtime")?;
    let (session, mut completions) = Session::new(
        Processor::new(config.delay()),
        HistoryStore::new(config.history_capacity),
        config.recent_window(),
        runtime.handle().clone(),
    );

    match options.command {
        Command::Process { mode, text, json } => {
            run_once(&runtime, &session, &mut completions, mode, text, json)
        }
        Command::Dashboard => {
            let mut dashboard =
                Dashboard::new(session, completions, config).context("failed to read terminal size")?;
            dashboard.run().context("terminal error")?;
            Ok(())
        }
        Command::Help => Ok(()),
    }
}
