//! # Webhooks
//!
//! Outbound notifications after a successful reload: the configured success
//! webhook (fixed JSON body) and the optional alert webhook enabled through
//! `ALERT_ON_RELOAD` / `ALERT_WEBHOOK_URL`. Both are fire-and-forget;
//! delivery failures are logged and never retried or surfaced.

use std::sync::LazyLock;

use serde_json::json;
use tracing::{error, info};

static HTTP: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// POST the fixed success body to the configured webhook, on its own task.
pub fn spawn_success_webhook(url: String) {
    tokio::spawn(async move {
        match HTTP.post(&url).json(&json!({"webhook": "update successful"})).send().await {
            Ok(response) => info!(url = %url, status = %response.status(), "reload webhook delivered"),
            Err(err) => error!(url = %url, error = %err, "reload webhook delivery failed"),
        }
    });
}

/// POST a human-readable reload summary to the alert webhook, if alerting is
/// enabled in the environment.
pub fn spawn_reload_alert(message: String) {
    if std::env::var("ALERT_ON_RELOAD").as_deref() != Ok("true") {
        return;
    }
    let Ok(url) = std::env::var("ALERT_WEBHOOK_URL") else {
        error!("ALERT_ON_RELOAD is set but ALERT_WEBHOOK_URL is not");
        return;
    };
    tokio::spawn(async move {
        if let Err(err) = HTTP.post(&url).json(&json!({"text": message})).send().await {
            error!(error = %err, "alert webhook delivery failed");
        }
    });
}
