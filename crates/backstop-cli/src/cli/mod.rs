//! CLI for the backstop resilience layer.

mod commands;

use anyhow::Result;
use backstop_core::config;
use clap::{Parser, Subcommand};

use commands::{run_classify, run_config, run_fetch, ClassifyArgs, FetchArgs};

/// Top-level CLI for backstop.
#[derive(Debug, Parser)]
#[command(name = "backstop")]
#[command(about = "backstop: guarded fetches with classified retries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch a public URL under the retry engine.
    Fetch {
        /// HTTP/HTTPS URL; private and loopback hosts are refused.
        url: String,
        /// Per-attempt timeout in milliseconds (default from config).
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
        /// Maximum attempts including the first (default from config).
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
        /// Model label to switch to on the first rate limit.
        #[arg(long, value_name = "MODEL")]
        fallback_model: Option<String>,
        /// URL serving the fallback model. Without it a rate limit only
        /// backs off; the request is not repeated immediately.
        #[arg(long, value_name = "URL")]
        fallback_url: Option<String>,
    },

    /// Classify a failure given as JSON (or plain text).
    Classify {
        /// Failure payload, e.g. '{"status":429}'.
        failure: String,
        /// Auth type: login-with-google, api-key, vertex-ai, cloud-shell.
        #[arg(long)]
        auth: Option<String>,
        /// User tier: free, legacy, standard.
        #[arg(long)]
        tier: Option<String>,
    },

    /// Show the config file location and effective settings.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                url,
                timeout_ms,
                max_attempts,
                fallback_model,
                fallback_url,
            } => {
                let args = FetchArgs {
                    url,
                    timeout_ms,
                    max_attempts,
                    fallback_model,
                    fallback_url,
                };
                run_fetch(&cfg, args).await?
            }
            CliCommand::Classify {
                failure,
                auth,
                tier,
            } => run_classify(
                &cfg,
                ClassifyArgs {
                    failure,
                    auth,
                    tier,
                },
            )?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
