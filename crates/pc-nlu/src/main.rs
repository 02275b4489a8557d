//! Proxmox Commander NLU — line-oriented resolver.
//!
//! Reads one utterance per line from stdin and prints the resolution (and,
//! when actionable, the command envelope) as JSON on stdout. All lines
//! share one conversation, so follow-ups like "restart it" work.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use pc_nlu::{NluConfig, Resolver};
use pc_protocol::{CommandEnvelope, Utterance};

const SESSION_ID: &str = "stdin";
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pc-nlu starting");

    // ── Load config ─────────────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "loading config");
            NluConfig::from_file(&path)?
        }
        None => NluConfig::default(),
    }
    .with_env_overrides()?;

    let resolver = Resolver::new(config)?;

    // ── Idle session eviction ───────────────────────────────────
    let mut eviction = tokio::time::interval(EVICTION_INTERVAL);
    eviction.tick().await;

    // ── Read loop ───────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let result = resolver.resolve(&line, SESSION_ID).await;
                println!("{}", serde_json::to_string(&result)?);

                let utterance = Utterance::new(line, SESSION_ID);
                if let Some(envelope) = CommandEnvelope::from_resolution(SESSION_ID, &utterance, &result) {
                    println!("{}", serde_json::to_string(&envelope)?);
                }
            }
            _ = eviction.tick() => {
                resolver.evict_expired().await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    resolver.close_session(SESSION_ID).await;
    tracing::info!("pc-nlu stopped");
    Ok(())
}
