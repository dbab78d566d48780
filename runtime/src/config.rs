use std::time::Duration;

use crate::util::parse_env_u64_with_bounds;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

const RESPONSE_TIMEOUT_MS: u64 = 10_000;
const RESPONSE_TIMEOUT_MS_MIN: u64 = 100;
const RESPONSE_TIMEOUT_MS_MAX: u64 = 120_000;
const APPROVAL_RESULT_GRACE_MS: u64 = 30_000;
const APPROVAL_RESULT_GRACE_MS_MIN: u64 = 0;
const APPROVAL_RESULT_GRACE_MS_MAX: u64 = 600_000;
const RESULT_DISPLAY_MS: u64 = 3_000;
const FAILURE_CLOSE_DELAY_MS: u64 = 2_000;
const RECOVERY_DIALOG_DELAY_MS: u64 = 1_000;
const UI_DELAY_MS_MIN: u64 = 0;
const UI_DELAY_MS_MAX: u64 = 60_000;

pub const API_URL_ENV: &str = "TOLLGATE_API_URL";
pub const WS_URL_ENV: &str = "TOLLGATE_WS_URL";
pub const RESPONSE_TIMEOUT_ENV: &str = "TOLLGATE_RESPONSE_TIMEOUT_MS";
pub const APPROVAL_RESULT_GRACE_ENV: &str = "TOLLGATE_APPROVAL_RESULT_GRACE_MS";
pub const RESULT_DISPLAY_ENV: &str = "TOLLGATE_RESULT_DISPLAY_MS";
pub const FAILURE_CLOSE_DELAY_ENV: &str = "TOLLGATE_FAILURE_CLOSE_DELAY_MS";
pub const RECOVERY_DIALOG_DELAY_ENV: &str = "TOLLGATE_RECOVERY_DIALOG_DELAY_MS";

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Base URL of the workflow engine's HTTP API.
    pub api_url: String,
    /// Base URL of the duplex endpoint. Derived from `api_url` when unset.
    pub ws_url: Option<String>,
    /// Bound on the fallback HTTP delivery.
    pub response_timeout: Duration,
    /// How long an approved command waits for an out-of-band execution result
    /// before closing as fire-and-forget success.
    pub approval_result_grace: Duration,
    pub result_display: Duration,
    pub failure_close_delay: Duration,
    pub recovery_dialog_delay: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            response_timeout: Duration::from_millis(RESPONSE_TIMEOUT_MS),
            approval_result_grace: Duration::from_millis(APPROVAL_RESULT_GRACE_MS),
            result_display: Duration::from_millis(RESULT_DISPLAY_MS),
            failure_close_delay: Duration::from_millis(FAILURE_CLOSE_DELAY_MS),
            recovery_dialog_delay: Duration::from_millis(RECOVERY_DIALOG_DELAY_MS),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, min: u64, max: u64, default: u64| {
            let (value, _) = parse_env_u64_with_bounds(lookup(key), min, max, default);
            Duration::from_millis(value)
        };
        Self {
            api_url: lookup(API_URL_ENV)
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            ws_url: lookup(WS_URL_ENV)
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            response_timeout: millis(
                RESPONSE_TIMEOUT_ENV,
                RESPONSE_TIMEOUT_MS_MIN,
                RESPONSE_TIMEOUT_MS_MAX,
                RESPONSE_TIMEOUT_MS,
            ),
            approval_result_grace: millis(
                APPROVAL_RESULT_GRACE_ENV,
                APPROVAL_RESULT_GRACE_MS_MIN,
                APPROVAL_RESULT_GRACE_MS_MAX,
                APPROVAL_RESULT_GRACE_MS,
            ),
            result_display: millis(
                RESULT_DISPLAY_ENV,
                UI_DELAY_MS_MIN,
                UI_DELAY_MS_MAX,
                RESULT_DISPLAY_MS,
            ),
            failure_close_delay: millis(
                FAILURE_CLOSE_DELAY_ENV,
                UI_DELAY_MS_MIN,
                UI_DELAY_MS_MAX,
                FAILURE_CLOSE_DELAY_MS,
            ),
            recovery_dialog_delay: millis(
                RECOVERY_DIALOG_DELAY_ENV,
                UI_DELAY_MS_MIN,
                UI_DELAY_MS_MAX,
                RECOVERY_DIALOG_DELAY_MS,
            ),
        }
    }

    /// Duplex base URL: explicit `ws_url`, or `api_url` with its scheme swapped.
    pub fn ws_base_url(&self) -> String {
        if let Some(ws_url) = &self.ws_url {
            return ws_url.clone();
        }
        if let Some(rest) = self.api_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.api_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.api_url.clone()
        }
    }
}
