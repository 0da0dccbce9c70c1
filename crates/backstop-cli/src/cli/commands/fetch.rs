//! `backstop fetch` – guarded fetch under the retry engine.

use anyhow::{bail, Result};
use backstop_core::classify::{AuthType, ClassifyContext, FailureClassification};
use backstop_core::config::BackstopConfig;
use backstop_core::fetch::{FetchError, FetchResponse, Fetcher};
use backstop_core::retry::{
    boxed_operation, execute_with_retry, Escalation, OperationFuture, RetryConfig,
};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub url: String,
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub fallback_model: Option<String>,
    pub fallback_url: Option<String>,
}

pub async fn run_fetch(cfg: &BackstopConfig, args: FetchArgs) -> Result<()> {
    let mut retry = cfg.retry_settings();
    if let Some(n) = args.max_attempts {
        retry.max_attempts = n;
    }
    let policy = retry.to_policy()?;
    let settings = cfg.fetch_settings();
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.timeout());
    let fetcher = Fetcher::from_settings(&settings);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let fallback = args.fallback_model.or_else(|| cfg.fallback_model.clone());
    let context = ClassifyContext {
        current_model: cfg.model.clone(),
        fallback_model: fallback.clone(),
        ..ClassifyContext::default()
    };
    let mut config: RetryConfig<FetchResponse, FetchError> =
        RetryConfig::new(policy).with_context(context);

    let label = fallback.or_else(|| args.fallback_url.clone());
    if let Some(model) = label {
        let (fetcher, fallback_url, cancel) =
            (fetcher.clone(), args.fallback_url.clone(), cancel.clone());
        config = config.with_escalation(
            move |_auth: Option<AuthType>, failure: &FailureClassification| {
                eprintln!("{}", failure.message);
                fallback_escalation(&fetcher, fallback_url.as_deref(), &model, timeout, &cancel)
            },
        );
    }

    let started = Instant::now();
    let operation = fetch_operation(fetcher, args.url.clone(), timeout, cancel.clone());
    match execute_with_retry(operation, &config, &cancel).await {
        Ok(resp) => {
            println!(
                "{} {} bytes in {:.2?}",
                resp.status,
                resp.body.len(),
                started.elapsed()
            );
            Ok(())
        }
        Err(err) => {
            tracing::warn!(url = %args.url, error = %err, "fetch failed");
            bail!("{}", err.user_message())
        }
    }
}

/// First rate limit of a run: move to the fallback endpoint when there is
/// one. Without it the same request would go out again at once, so keep
/// retrying with backoff and let the server's retry-after apply.
fn fallback_escalation(
    fetcher: &Fetcher,
    fallback_url: Option<&str>,
    model: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Escalation<FetchResponse, FetchError> {
    match fallback_url {
        Some(url) => {
            tracing::info!(model = %model, url = %url, "rate limited, switching to fallback");
            Escalation::Fallback {
                operation: boxed_operation(fetch_operation(
                    fetcher.clone(),
                    url.to_string(),
                    timeout,
                    cancel.clone(),
                )),
                model: model.to_string(),
            }
        }
        None => {
            tracing::info!(model = %model, "rate limited, no fallback endpoint; backing off");
            Escalation::Continue { backoff: None }
        }
    }
}

/// One attempt: guarded GET, non-2xx turned into an error.
fn fetch_operation(
    fetcher: Fetcher,
    url: String,
    timeout: Duration,
    cancel: CancellationToken,
) -> impl FnMut() -> OperationFuture<FetchResponse, FetchError> + Send + 'static {
    move || {
        let fetcher = fetcher.clone();
        let url = url.clone();
        let cancel = cancel.clone();
        Box::pin(async move {
            fetcher
                .fetch_with_cancel(&url, timeout, &cancel)
                .await?
                .error_for_status()
        }) as OperationFuture<FetchResponse, FetchError>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_url_switches_operation() {
        let escalation = fallback_escalation(
            &Fetcher::new(),
            Some("https://fallback.example/v1"),
            "gemini-2.5-flash",
            Duration::from_secs(1),
            &CancellationToken::new(),
        );
        match escalation {
            Escalation::Fallback { model, .. } => assert_eq!(model, "gemini-2.5-flash"),
            other => panic!("expected Fallback, got {other:?}"),
        }
    }

    #[test]
    fn without_fallback_url_backs_off() {
        let escalation = fallback_escalation(
            &Fetcher::new(),
            None,
            "gemini-2.5-flash",
            Duration::from_secs(1),
            &CancellationToken::new(),
        );
        assert!(matches!(escalation, Escalation::Continue { backoff: None }));
    }
}
