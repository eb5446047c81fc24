use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use loadgen::config::{
    parse_concurrency_or_default, parse_count, BatchConfig, RunMode, Target, DEFAULT_ATTEMPTS,
};
use loadgen::progress::{ConsoleProgress, Counting};
use loadgen::prompt::Prompter;
use loadgen::retry::Backoff;
use mimalloc::MiMalloc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "loadgen")]
#[command(about = "Fire bounded-concurrency HTTP GET batches at a single URL", long_about = None)]
struct Cli {
    /// Target URL (plain http). Prompted for when missing.
    #[arg(short, long)]
    url: Option<String>,

    /// Maximum requests in flight. Prompted for when missing.
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Attempts per request, the first one included.
    #[arg(long, default_value_t = DEFAULT_ATTEMPTS)]
    attempts: u32,

    /// Per-attempt timeout.
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Pause between attempts of the same request.
    #[arg(long, default_value_t = 500)]
    backoff_ms: u64,

    /// Double the pause after every failed attempt, up to this ceiling.
    #[arg(long)]
    backoff_max_ms: Option<u64>,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,

    /// Print the final summary as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a fixed number of requests (default)
    Fixed {
        #[arg(long)]
        requests: Option<u64>,
    },
    /// Keep sending batches until enough requests have succeeded
    Until {
        #[arg(long)]
        successes: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let Some(config) = resolve(&cli, &mut prompter)? else {
        return Ok(());
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let counting = match config.mode {
        RunMode::Fixed { .. } => Counting::Completed,
        RunMode::UntilDone { .. } => Counting::Successes,
    };
    let progress = ConsoleProgress::new(io::stderr(), config.mode.goal(), counting);
    let summary = rt.block_on(loadgen::run(config, progress))?;

    if cli.json {
        let out = serde_json::to_string_pretty(&summary).context("Failed to encode summary")?;
        println!("{out}");
    } else {
        println!("\nRun complete!");
        println!("{summary}");
    }
    Ok(())
}

/// Fills in missing settings from the operator. `None` means the run was
/// cancelled at the confirmation prompt.
fn resolve<R: BufRead, W: Write>(
    cli: &Cli,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<Option<BatchConfig>> {
    prompter.say(&format!("loadgen {}\n", env!("CARGO_PKG_VERSION")))?;

    let url = match &cli.url {
        Some(url) => url.clone(),
        None => prompter.ask("Enter target URL: ")?,
    };
    let target = Target::parse(&url)?;

    let mode = match &cli.mode {
        None | Some(Mode::Fixed { requests: None }) => RunMode::Fixed {
            total_requests: parse_count(&prompter.ask("Enter number of requests: ")?)?,
        },
        Some(Mode::Fixed {
            requests: Some(total_requests),
        }) => RunMode::Fixed {
            total_requests: *total_requests,
        },
        Some(Mode::Until { successes: None }) => RunMode::UntilDone {
            target_successes: parse_count(&prompter.ask("Enter number of successful requests: ")?)?,
        },
        Some(Mode::Until {
            successes: Some(target_successes),
        }) => RunMode::UntilDone {
            target_successes: *target_successes,
        },
    };

    let concurrency = match cli.concurrency {
        Some(concurrency) => concurrency,
        None => parse_concurrency_or_default(
            &prompter.ask("Enter concurrency (recommended 300-1000): ")?,
        ),
    };

    let base = Duration::from_millis(cli.backoff_ms);
    let backoff = match cli.backoff_max_ms {
        Some(max_ms) => Backoff::Exponential {
            base,
            max: Duration::from_millis(max_ms),
        },
        None if base.is_zero() => Backoff::None,
        None => Backoff::Fixed(base),
    };
    let config = BatchConfig::new(target, mode)
        .with_concurrency(concurrency)?
        .with_retry(cli.attempts, backoff)?
        .with_request_timeout(Duration::from_secs(cli.timeout_secs))?;

    prompter.say(&format!("\nURL:         {}", config.target))?;
    match config.mode {
        RunMode::Fixed { total_requests } => {
            prompter.say(&format!("Requests:    {total_requests}"))?;
        }
        RunMode::UntilDone { target_successes } => {
            prompter.say(&format!("Successes:   {target_successes}"))?;
        }
    }
    prompter.say(&format!("Concurrency: {}", config.concurrency))?;
    prompter.say(&format!("Attempts:    {}", config.retry.attempts()))?;
    prompter.say(&format!("Timeout:     {:?}", config.request_timeout))?;

    if !cli.yes && !prompter.confirm("\nStart? (y/n): ")? {
        prompter.say("Cancelled.")?;
        return Ok(None);
    }
    Ok(Some(config))
}
