use serde_json::{Value, json};
use tollgate_core::{FailureReason, HitlError, InteractionOutcome};

pub const EXIT_OK: i32 = 0;
pub const EXIT_NOT_DELIVERED: i32 = 1;
pub const EXIT_CONNECTION: i32 = 3;
pub const EXIT_USAGE: i32 = 4;

pub fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

pub fn error_json(error: &str, message: &str, docs_hint: Option<&str>) -> Value {
    let mut err = json!({
        "error": error,
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    err
}

/// Print a structured error on stderr and return the matching exit code.
pub fn report_error(err: &HitlError, docs_hint: Option<&str>) -> i32 {
    let value = error_json(err.code(), &err.to_string(), docs_hint);
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    );
    match err {
        HitlError::Network(_) | HitlError::Timeout(_) | HitlError::Channel(_) => EXIT_CONNECTION,
        HitlError::InvalidInteraction(_) => EXIT_USAGE,
        _ => EXIT_NOT_DELIVERED,
    }
}

pub fn outcome_exit_code(outcome: &InteractionOutcome) -> i32 {
    match outcome.failure_reason() {
        None => EXIT_OK,
        Some(FailureReason::Timeout | FailureReason::NetworkError) => EXIT_CONNECTION,
        Some(FailureReason::NoSessionContext) => EXIT_USAGE,
        Some(FailureReason::ServerError) => EXIT_NOT_DELIVERED,
    }
}
