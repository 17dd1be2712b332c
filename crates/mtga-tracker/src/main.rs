mod logging;

use anyhow::Context;
use clap::Parser;
use ingest::{Cancel, LogMemory, ParseOptions, TailOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// mtga-tracker distills the MTG Arena client log into a local SQLite record
/// of matches, decks, drafts and observed card plays.
#[derive(Debug, Parser)]
#[clap(author, version, name = "mtga-tracker")]
struct Cli {
    #[clap(flatten)]
    log_args: logging::LogArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Command {
    /// One-shot backfill over historical log files.
    Parse(ParseArgs),
    /// Poll the live log on an interval, ingesting appended lines.
    Tail(TailArgs),
    /// Serve the read API, and optionally a built frontend.
    Serve(ServeArgs),
}

#[derive(Debug, clap::Args)]
struct ParseArgs {
    /// Path of the tracker database.
    #[clap(long)]
    db: PathBuf,
    /// Log file to parse. Defaults to the platform-standard locations.
    #[clap(long)]
    log: Option<PathBuf>,
    /// Parse the rotated previous log before the current one.
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set)]
    include_prev: bool,
    /// Resume from the committed boundary instead of re-reading from the top.
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set)]
    resume: bool,
}

#[derive(Debug, clap::Args)]
struct TailArgs {
    /// Path of the tracker database.
    #[clap(long)]
    db: PathBuf,
    /// Log file to tail. Defaults to the platform-standard location.
    #[clap(long)]
    log: Option<PathBuf>,
    /// Poll interval, e.g. "2s" or "500ms".
    #[clap(long, default_value = "2s", value_parser = humantime::parse_duration)]
    interval: Duration,
    /// Also log ticks that found nothing new.
    #[clap(long)]
    verbose: bool,
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    /// Path of the tracker database.
    #[clap(long)]
    db: PathBuf,
    /// Listen address, e.g. ":8080" or "127.0.0.1:9000".
    #[clap(long, default_value = ":8080")]
    addr: String,
    /// Directory of built frontend assets to serve alongside the API.
    #[clap(long)]
    web_dist: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init_logging(&cli.log_args);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start runtime");
            std::process::exit(2);
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Command::Parse(args) => run_parse(args).await,
            Command::Tail(args) => run_tail(args).await,
            Command::Serve(args) => run_serve(args).await,
        }
    });

    if let Err(err) = result {
        tracing::error!(error = ?err, "command failed");
        std::process::exit(2);
    }
}

/// A cancellation token wired to ctrl-c, honored between lines and across
/// tail sleeps.
fn cancel_on_ctrl_c() -> Cancel {
    let cancel = Cancel::new();
    let signalled = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; finishing current batch");
            signalled.cancel();
        }
    });
    cancel
}

async fn run_parse(args: ParseArgs) -> anyhow::Result<()> {
    let cancel = cancel_on_ctrl_c();
    tokio::task::spawn_blocking(move || parse_all(args, cancel)).await?
}

fn parse_all(args: ParseArgs, cancel: Cancel) -> anyhow::Result<()> {
    let db = store::open(&args.db)
        .with_context(|| format!("opening tracker database {}", args.db.display()))?;

    let paths = match args.log {
        Some(log) => vec![log],
        None => ingest::default_log_paths(args.include_prev),
    };
    if paths.is_empty() {
        return Err(ingest::Error::NoDefaultLog.into());
    }

    let options = ParseOptions { resume: args.resume };
    let (mut files, mut lines, mut events) = (0u64, 0u64, 0u64);
    for path in paths {
        // Per-log memory is scoped to its path; files never share state.
        let mut memory = LogMemory::default();
        let outcome = ingest::parse_file(&db, &mut memory, &path, &options, &cancel)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            lines = outcome.lines,
            events = outcome.events,
            offset = outcome.end_offset,
            rotated = outcome.rotated,
            "parsed log file"
        );
        files += 1;
        lines += outcome.lines;
        events += outcome.events;
        if outcome.cancelled {
            break;
        }
    }
    tracing::info!(files, lines, events, "backfill complete");
    Ok(())
}

async fn run_tail(args: TailArgs) -> anyhow::Result<()> {
    let cancel = cancel_on_ctrl_c();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let db = store::open(&args.db)
            .with_context(|| format!("opening tracker database {}", args.db.display()))?;

        let path = match args.log {
            Some(log) => log,
            None => ingest::default_log_paths(false)
                .into_iter()
                .next()
                .ok_or(ingest::Error::NoDefaultLog)?,
        };
        let options = TailOptions {
            interval: args.interval,
            verbose: args.verbose,
        };
        ingest::tail(&db, &path, &options, &cancel)?;
        Ok(())
    })
    .await?
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let addr = parse_addr(&args.addr)?;
    api::serve(addr, args.db, args.web_dist).await
}

/// Accepts both full socket addresses and the Go-style ":8080" shorthand.
fn parse_addr(raw: &str) -> anyhow::Result<SocketAddr> {
    let normalized = if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    };
    normalized
        .parse()
        .with_context(|| format!("invalid listen address {:?}", raw))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_addr_shorthand() {
        assert_eq!(parse_addr(":8080").unwrap().port(), 8080);
        assert_eq!(
            parse_addr("127.0.0.1:9000").unwrap(),
            "127.0.0.1:9000".parse().unwrap()
        );
        assert!(parse_addr("nonsense").is_err());
    }

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from([
            "mtga-tracker",
            "parse",
            "--db",
            "tracker.db",
            "--include-prev",
            "false",
            "--resume",
            "false",
        ]);
        match cli.command {
            Command::Parse(args) => {
                assert!(!args.include_prev);
                assert!(!args.resume);
            }
            other => panic!("expected parse, got {:?}", other),
        }
    }
}
