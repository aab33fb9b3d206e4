use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turnstile::config::TurnstileConfig;
use turnstile::envelope::Outcome;
use turnstile::ratelimit::{InMemoryBucketStore, LimitVerdict, Limiter, Sweeper, SystemClock};

/// Exercise per-subject fixed-window quotas from the command line.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a series of checks for one token and print each envelope as JSON
    Check {
        /// Subject token (IP, user id or API key)
        #[arg(short, long)]
        token: String,

        /// Named policy from the configuration file
        #[arg(short, long, conflicts_with_all = ["limit", "window_ms"])]
        policy: Option<String>,

        /// Maximum requests per window
        #[arg(short, long, requires = "window_ms", allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Window length in milliseconds
        #[arg(short, long, requires = "limit", allow_negative_numbers = true)]
        window_ms: Option<i64>,

        /// Number of checks to issue
        #[arg(short = 'n', long, default_value_t = 1)]
        calls: usize,

        /// Pause between sequential checks in milliseconds
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,

        /// Issue all checks at once instead of one after another
        #[arg(long)]
        concurrent: bool,

        /// Run each call as a guarded operation, applying the configured
        /// failure policy when the store is unavailable
        #[arg(long)]
        guarded: bool,
    },
    /// List the configured policies
    Policies,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TurnstileConfig::load(cli.config.as_deref())?;
    info!(
        policies = config.policies.len(),
        sweeper_enabled = config.sweeper.enabled,
        "Configuration loaded"
    );

    match cli.command {
        Command::Policies => {
            for name in config.policies.names() {
                if let Some(policy) = config.policies.get(name) {
                    println!("{}\t{}/{}ms", name, policy.limit, policy.window_ms);
                }
            }
        }
        Command::Check {
            token,
            policy,
            limit,
            window_ms,
            calls,
            interval_ms,
            concurrent,
            guarded,
        } => {
            let (limit, window_ms) = match (&policy, limit, window_ms) {
                (Some(name), _, _) => {
                    let policy = config.policies.get(name).ok_or_else(|| {
                        anyhow::anyhow!("unknown policy '{}'", name)
                    })?;
                    (policy.limit as i64, policy.window_ms as i64)
                }
                (None, Some(limit), Some(window_ms)) => (limit, window_ms),
                _ => anyhow::bail!("either --policy or --limit with --window-ms is required"),
            };
            let failure_policy = config.failure_policy;

            let limiter = Arc::new(Limiter::new(Arc::new(InMemoryBucketStore::new()), SystemClock));

            let sweeper = config.sweeper.enabled.then(|| {
                Sweeper::spawn(
                    limiter.clone(),
                    config.sweeper.interval(),
                    config.sweeper.idle_grace_ms,
                )
            });

            let check = |limiter: Arc<Limiter>| {
                let token = token.clone();
                async move {
                    if guarded {
                        let outcome = limiter
                            .guard(&token, limit, window_ms, failure_policy, || async {
                                Ok::<_, String>(format!("{} admitted", token))
                            })
                            .await;
                        serde_json::to_value(&outcome)
                    } else {
                        let outcome = Outcome::<LimitVerdict>::from(
                            limiter.check(&token, limit, window_ms).await,
                        );
                        serde_json::to_value(&outcome)
                    }
                }
            };

            let outcomes = if concurrent {
                join_all((0..calls).map(|_| check(limiter.clone())))
                    .await
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                let mut outcomes = Vec::with_capacity(calls);
                for i in 0..calls {
                    if i > 0 && interval_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                    }
                    outcomes.push(check(limiter.clone()).await?);
                }
                outcomes
            };

            for outcome in &outcomes {
                println!("{}", outcome);
            }

            let admitted = outcomes
                .iter()
                .filter(|o| o["success"] == serde_json::Value::Bool(true))
                .count();
            info!(token = %token, calls = calls, admitted = admitted, "Checks complete");

            if let Some(sweeper) = sweeper {
                sweeper.shutdown().await;
            }
        }
    }

    Ok(())
}

/// Initialize tracing on stderr so stdout carries only envelopes.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
