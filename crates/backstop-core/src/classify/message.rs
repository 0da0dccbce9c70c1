//! User-facing failure messages.

use serde_json::Value;

use super::quota::quota_kind;
use super::status::{embedded_payload, extract_status};
use super::{AuthType, QuotaKind, UserTier};

/// Pass-through messages longer than this many characters are cut.
pub const MAX_MESSAGE_CHARS: usize = 500;

const UNKNOWN_MESSAGE: &str = "An unknown error occurred.";

/// Best-effort message text of a failure; `None` when there is nothing to show.
pub(super) fn message_text(failure: &Value) -> Option<String> {
    match failure {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => failure
            .get("message")
            .or_else(|| failure.pointer("/error/message"))
            .or_else(|| failure.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string),
        other => Some(other.to_string()),
    }
}

/// Build the message shown to the end user for a failure.
///
/// Quota failures get a fixed explanation (mentioning the downgrade when a
/// fallback model is known) plus an auth/tier specific hint. Anything else
/// passes the underlying message through, truncated to
/// [`MAX_MESSAGE_CHARS`].
pub fn format_message(
    failure: &Value,
    auth_type: Option<AuthType>,
    user_tier: Option<UserTier>,
    current_model: Option<&str>,
    fallback_model: Option<&str>,
) -> String {
    let mut msg = match quota_kind(failure, user_tier) {
        QuotaKind::ProQuota => {
            let model = current_model.unwrap_or("the current model");
            match fallback_model {
                Some(fallback) => format!(
                    "You have reached the daily quota for {model}. \
                     Requests are being downgraded from {model} to {fallback} for the rest of this session."
                ),
                None => format!("You have reached the daily quota for {model}."),
            }
        }
        QuotaKind::GenericQuota => {
            let mut msg = String::from("Rate limited by the server; retrying with backoff.");
            if let Some(fallback) = fallback_model {
                msg.push_str(&format!(
                    " Requests may be downgraded to {fallback} if the limit persists."
                ));
            }
            msg
        }
        QuotaKind::None => return passthrough(failure),
    };
    if let Some(hint) = quota_hint(auth_type, user_tier) {
        msg.push('\n');
        msg.push_str(hint);
    }
    msg
}

fn quota_hint(auth_type: Option<AuthType>, user_tier: Option<UserTier>) -> Option<&'static str> {
    match auth_type? {
        AuthType::ApiKey => Some("A paid API key raises these limits."),
        AuthType::LoginWithGoogle => match user_tier {
            Some(UserTier::Standard) => {
                Some("Ask your administrator to raise the quota for your organization.")
            }
            _ => Some("Upgrade to a paid plan or switch to an API key for higher limits."),
        },
        AuthType::VertexAi | AuthType::CloudShell => {
            Some("Request a quota increase for your Cloud project.")
        }
    }
}

fn passthrough(failure: &Value) -> String {
    let text = embedded_payload(failure)
        .as_ref()
        .and_then(message_text)
        .or_else(|| message_text(failure))
        .or_else(|| failure.is_object().then(|| failure.to_string()))
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string());
    let text = match extract_status(failure) {
        Some(status) if !text.contains(&status.to_string()) => format!("[{status}] {text}"),
        _ => text,
    };
    truncate(text, MAX_MESSAGE_CHARS)
}

fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut short = text[..cut].to_string();
            short.push('…');
            short
        }
        None => text,
    }
}
