//! Webhook delivery of finished runs.
//!
//! Retry policy:
//! - 429 and 5xx are retried with exponential backoff (429 honours
//!   `Retry-After` when it is a number of seconds)
//! - network and timeout errors are retried the same way
//! - any other 4xx fails immediately
//! - after `MAX_RETRIES` retries the last failure is returned

use std::thread;
use std::time::Duration;

use reconbot_recon::model::ReconciliationRun;
use reconbot_recon::{Notifier, ReconError};
use serde::Serialize;

pub const MAX_RETRIES: u32 = 3;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("reconbot/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    name: &'a str,
    run: &'a ReconciliationRun,
}

pub struct WebhookNotifier {
    http: reqwest::blocking::Client,
    url: String,
    name: String,
    initial_backoff: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Result<Self, String> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            http,
            url: url.into(),
            name: name.into(),
            initial_backoff: Duration::from_secs(1),
        })
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn post(&self, run: &ReconciliationRun) -> Result<(), String> {
        let payload = WebhookPayload { event: "reconciliation.completed", name: &self.name, run };
        let mut backoff = self.initial_backoff;

        for attempt in 0..=MAX_RETRIES {
            match self.http.post(&self.url).json(&payload).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if resp.status().is_success() {
                        log::info!("webhook accepted run ({status})");
                        return Ok(());
                    }

                    if status != 429 && status < 500 {
                        let body: String =
                            resp.text().unwrap_or_default().chars().take(200).collect();
                        return Err(format!("webhook rejected run ({status}): {body}"));
                    }

                    if attempt == MAX_RETRIES {
                        return Err(format!(
                            "webhook {} after {} attempts ({status})",
                            if status == 429 { "rate limited" } else { "upstream error" },
                            MAX_RETRIES + 1,
                        ));
                    }

                    let wait = if status == 429 {
                        resp.headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .unwrap_or(backoff)
                    } else {
                        backoff
                    };
                    log::warn!(
                        "webhook retry {}/{} in {:?} (HTTP {status})",
                        attempt + 1,
                        MAX_RETRIES,
                        wait
                    );
                    thread::sleep(wait);
                }
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(format!(
                            "webhook unreachable after {} attempts: {e}",
                            MAX_RETRIES + 1
                        ));
                    }
                    log::warn!(
                        "webhook retry {}/{} in {:?} ({e})",
                        attempt + 1,
                        MAX_RETRIES,
                        backoff
                    );
                    thread::sleep(backoff);
                }
            }
            backoff *= 2;
        }

        Err("webhook: retries exhausted".into())
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, run: &ReconciliationRun) -> Result<(), ReconError> {
        self.post(run).map_err(ReconError::Notify)
    }
}
