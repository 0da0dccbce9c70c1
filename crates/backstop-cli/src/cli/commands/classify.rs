//! `backstop classify` – show how a failure payload is classified.

use anyhow::{Context, Result};
use backstop_core::classify::{classify_failure, ClassifyContext};
use backstop_core::config::BackstopConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ClassifyArgs {
    pub failure: String,
    pub auth: Option<String>,
    pub tier: Option<String>,
}

pub fn run_classify(cfg: &BackstopConfig, args: ClassifyArgs) -> Result<()> {
    let context = ClassifyContext {
        auth_type: args.auth.as_deref().map(parse_label).transpose()?,
        user_tier: args.tier.as_deref().map(parse_label).transpose()?,
        current_model: cfg.model.clone(),
        fallback_model: cfg.fallback_model.clone(),
    };
    let payload = parse_payload(&args.failure);
    let c = classify_failure(&payload, &context);

    println!("kind:        {}", label(&c.kind));
    println!(
        "status:      {}",
        c.status.map_or_else(|| "-".to_string(), |s| s.to_string())
    );
    println!("quota:       {}", label(&c.quota_kind));
    println!(
        "retry-after: {}",
        c.retry_after
            .map_or_else(|| "-".to_string(), |d| format!("{:?}", d))
    );
    println!("message:     {}", c.message);
    Ok(())
}

/// JSON if it parses, otherwise the raw text as a string failure.
pub(crate) fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a kebab-case label into one of the core enums.
pub(crate) fn parse_label<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_value(Value::String(raw.to_string()))
        .with_context(|| format!("unknown value {raw:?}"))
}

fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => "?".to_string(),
    }
}
