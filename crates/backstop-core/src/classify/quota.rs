//! Quota exhaustion detection.

use serde_json::Value;

use super::status::{extract_status, rpc_status};
use super::{QuotaKind, UserTier};

/// Markers the server uses when the paid model's quota is exhausted.
const PRO_MARKERS: [&str; 3] = ["Pro Requests", "pro_requests", "ProRequests"];
/// Daily-limit markers; on the free tier these mean the pro allowance is gone.
const DAILY_MARKERS: [&str; 2] = ["per day", "PerDay"];
const QUOTA_MARKERS: [&str; 2] = ["Quota exceeded", "RESOURCE_EXHAUSTED"];

/// Decide which quota, if any, a failure reports as exhausted.
pub fn quota_kind(failure: &Value, tier_hint: Option<UserTier>) -> QuotaKind {
    let text = match failure {
        Value::Null => return QuotaKind::None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let quota_context = extract_status(failure) == Some(429)
        || rpc_status(failure).as_deref() == Some("RESOURCE_EXHAUSTED")
        || QUOTA_MARKERS.iter().any(|m| text.contains(m));
    if !quota_context {
        return QuotaKind::None;
    }

    let pro = PRO_MARKERS.iter().any(|m| text.contains(m));
    let free_daily =
        tier_hint == Some(UserTier::Free) && DAILY_MARKERS.iter().any(|m| text.contains(m));
    if pro || free_daily {
        QuotaKind::ProQuota
    } else {
        QuotaKind::GenericQuota
    }
}
