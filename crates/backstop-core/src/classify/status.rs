//! Status code and retry-after extraction from loosely-typed failures.

use serde_json::Value;
use std::time::{Duration, SystemTime};

use super::message::message_text;

/// Find an HTTP-like status code in a failure.
///
/// Checked in order: numeric `status`, numeric `code`, nested `error.code`,
/// nested `response.status`, a JSON payload embedded in the message text, and
/// finally a 4xx/5xx token in the message text that is either its prefix
/// (`429 ...`, `[503] ...`) or follows `HTTP`, `status`, `code` or `error`.
/// Only 100..=599 counts, so gRPC codes and errno-like numbers are ignored.
pub fn extract_status(failure: &Value) -> Option<u16> {
    status_from_fields(failure)
        .or_else(|| embedded_payload(failure).as_ref().and_then(status_from_fields))
        .or_else(|| message_text(failure).and_then(|text| status_in_text(&text)))
}

fn status_from_fields(value: &Value) -> Option<u16> {
    let obj = value.as_object()?;
    [
        obj.get("status"),
        obj.get("code"),
        value.pointer("/error/code"),
        value.pointer("/response/status"),
    ]
    .into_iter()
    .flatten()
    .find_map(http_like)
}

fn http_like(value: &Value) -> Option<u16> {
    let n = value.as_u64()?;
    (100..=599).contains(&n).then_some(n as u16)
}

fn status_in_text(text: &str) -> Option<u16> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - start != 3 || !marks_status(&text[..start]) {
            continue;
        }
        if let Ok(code) = text[start..i].parse::<u16>() {
            if (400..=599).contains(&code) {
                return Some(code);
            }
        }
    }
    None
}

/// Whether the text before a number makes it a status: nothing at all, or a
/// status word. Durations (`after 500ms`) and ports (`port 443`) do not.
fn marks_status(before: &str) -> bool {
    let before = before
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '[' | '(' | '='));
    if before.is_empty() {
        return true;
    }
    let word = before
        .rsplit(|c: char| !(c.is_ascii_alphanumeric() || c == '/' || c == '.'))
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    word.starts_with("http") || matches!(word.as_str(), "status" | "code" | "error")
}

/// Symbolic RPC status (e.g. `RESOURCE_EXHAUSTED`), if the payload carries one.
pub(super) fn rpc_status(failure: &Value) -> Option<String> {
    fn from_fields(value: &Value) -> Option<String> {
        value
            .pointer("/error/status")
            .or_else(|| value.get("status"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
    from_fields(failure).or_else(|| embedded_payload(failure).as_ref().and_then(from_fields))
}

/// Parse a JSON object embedded in the failure's message text.
///
/// Client libraries often stringify the server's error body into the message,
/// e.g. `got status: 429. {"error":{"code":429,...}}`.
pub(super) fn embedded_payload(failure: &Value) -> Option<Value> {
    let text = message_text(failure)?;
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Server-provided delay before retrying, if the failure carries one.
///
/// Recognizes `retry_after` / `retryAfter` seconds, a `retry-after` header
/// (top-level `headers` or `response.headers`), and a Google RPC `RetryInfo`
/// detail with a `retryDelay` such as `"3.5s"`.
pub fn retry_after(failure: &Value) -> Option<Duration> {
    retry_after_fields(failure)
        .or_else(|| embedded_payload(failure).as_ref().and_then(retry_after_fields))
}

fn retry_after_fields(value: &Value) -> Option<Duration> {
    let obj = value.as_object()?;
    if let Some(d) = obj
        .get("retry_after")
        .or_else(|| obj.get("retryAfter"))
        .and_then(seconds_value)
    {
        return Some(d);
    }
    let header = [value.get("headers"), value.pointer("/response/headers")]
        .into_iter()
        .flatten()
        .find_map(|headers| header_value(headers, "retry-after"));
    if let Some(d) = header.and_then(|h| parse_retry_after(&h)) {
        return Some(d);
    }
    rpc_retry_delay(value)
}

fn seconds_value(value: &Value) -> Option<Duration> {
    match value {
        Value::Number(n) => n.as_f64().and_then(secs_f64),
        Value::String(s) => parse_retry_after(s),
        _ => None,
    }
}

fn header_value(headers: &Value, name: &str) -> Option<String> {
    let (_, value) = headers
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn rpc_retry_delay(value: &Value) -> Option<Duration> {
    value
        .pointer("/error/details")?
        .as_array()?
        .iter()
        .filter(|d| {
            d.get("@type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.ends_with("RetryInfo"))
        })
        .find_map(|d| d.get("retryDelay").and_then(Value::as_str))
        .and_then(|delay| delay.trim().strip_suffix('s')?.parse::<f64>().ok())
        .and_then(secs_f64)
}

/// Fractional seconds as a delay; `None` for negative, NaN or values too
/// large for a `Duration`.
fn secs_f64(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>() {
        return secs_f64(secs);
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_field_order() {
        assert_eq!(extract_status(&json!({"status": 503, "code": 400})), Some(503));
        assert_eq!(extract_status(&json!({"code": 404})), Some(404));
        assert_eq!(extract_status(&json!({"error": {"code": 429}})), Some(429));
        assert_eq!(extract_status(&json!({"response": {"status": 502}})), Some(502));
    }

    #[test]
    fn non_http_codes_are_skipped() {
        // gRPC code 8 sits in `code`; the message still carries the HTTP status.
        let failure = json!({"code": 8, "message": "HTTP 429 Too Many Requests"});
        assert_eq!(extract_status(&failure), Some(429));
        assert_eq!(extract_status(&json!({"code": "ECONNRESET"})), None);
    }

    #[test]
    fn status_from_message_text() {
        assert_eq!(extract_status(&json!("[429 Too Many Requests] slow down")), Some(429));
        assert_eq!(extract_status(&json!("Gemini 2.5 Pro took 1500ms")), None);
        assert_eq!(extract_status(&json!("HTTP/1.1 503 Service Unavailable")), Some(503));
        assert_eq!(extract_status(&json!("got status: 429. slow down")), Some(429));
        assert_eq!(extract_status(&json!("Error 500 from backend")), Some(500));
        assert_eq!(extract_status(&json!("HTTP 200 then 503")), None);
    }

    #[test]
    fn numbers_in_prose_are_not_statuses() {
        assert_eq!(extract_status(&json!("request timed out after 500ms")), None);
        assert_eq!(
            extract_status(&json!(
                "connection failed: Failed to connect to api.example port 443 after 12 ms"
            )),
            None
        );
        assert_eq!(extract_status(&json!("retried 404 times")), None);
    }

    #[test]
    fn status_from_embedded_json() {
        let failure = json!({
            "message": "got status: 429. {\"error\":{\"code\":429,\"status\":\"RESOURCE_EXHAUSTED\"}}"
        });
        assert_eq!(extract_status(&failure), Some(429));
        assert_eq!(rpc_status(&failure).as_deref(), Some("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn tolerates_odd_inputs() {
        assert_eq!(extract_status(&Value::Null), None);
        assert_eq!(extract_status(&json!(42)), None);
        assert_eq!(extract_status(&json!([1, 2, 3])), None);
        assert_eq!(extract_status(&json!("{ not json }")), None);
        assert_eq!(retry_after(&Value::Null), None);
    }

    #[test]
    fn retry_after_fields_and_headers() {
        assert_eq!(
            retry_after(&json!({"retryAfter": 2.5})),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(
            retry_after(&json!({"headers": {"Retry-After": "12"}})),
            Some(Duration::from_secs(12))
        );
        assert_eq!(
            retry_after(&json!({"response": {"headers": {"retry-after": 3}}})),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn retry_after_from_rpc_retry_info() {
        let failure = json!({"error": {"code": 429, "details": [
            {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
            {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "3.5s"}
        ]}});
        assert_eq!(retry_after(&failure), Some(Duration::from_millis(3500)));
    }

    #[test]
    fn parse_retry_after_forms() {
        assert_eq!(parse_retry_after(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("NaN"), None);
    }

    #[test]
    fn oversized_retry_after_is_ignored() {
        assert_eq!(parse_retry_after("1e30"), None);
        assert_eq!(retry_after(&json!({"retry_after": 1e30})), None);
        assert_eq!(retry_after(&json!({"retryAfter": "1e30"})), None);
        assert_eq!(retry_after(&json!({"headers": {"Retry-After": "1e30"}})), None);
        let rpc = json!({"error": {"code": 429, "details": [
            {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "1e30s"}
        ]}});
        assert_eq!(retry_after(&rpc), None);
        // Huge whole seconds still fit.
        assert_eq!(
            parse_retry_after("18446744073709551615"),
            Some(Duration::from_secs(u64::MAX))
        );
    }
}
