use super::parse;
use crate::cli::commands::{parse_label, parse_payload};
use crate::cli::CliCommand;
use backstop_core::classify::{AuthType, UserTier};
use serde_json::json;

#[test]
fn cli_parse_classify() {
    match parse(&[
        "backstop",
        "classify",
        r#"{"status":429}"#,
        "--auth",
        "login-with-google",
        "--tier",
        "free",
    ]) {
        CliCommand::Classify {
            failure,
            auth,
            tier,
        } => {
            assert_eq!(failure, r#"{"status":429}"#);
            assert_eq!(auth.as_deref(), Some("login-with-google"));
            assert_eq!(tier.as_deref(), Some("free"));
        }
        _ => panic!("expected Classify"),
    }
}

#[test]
fn payload_falls_back_to_text() {
    assert_eq!(parse_payload(r#"{"code":503}"#), json!({"code": 503}));
    assert_eq!(parse_payload("socket hang up"), json!("socket hang up"));
}

#[test]
fn labels_parse_kebab_case() {
    let auth: AuthType = parse_label("vertex-ai").unwrap();
    assert_eq!(auth, AuthType::VertexAi);
    let tier: UserTier = parse_label("standard").unwrap();
    assert_eq!(tier, UserTier::Standard);
    assert!(parse_label::<AuthType>("password").is_err());
}
