//! Webhook notifications for warning and error events.
//!
//! [`AlertingReporter`] wraps another reporter and, for every event that has
//! an [`alert_message`](BatchEvent::alert_message), queues the message on a
//! channel. An [`AlertDispatcher`] task drains the channel and posts each
//! message to a Slack-style webhook. Reporting never blocks on the network
//! and webhook failures are only logged.

use std::time::Duration;

use harvest_core::error::AppError;
use harvest_core::events::{BatchEvent, BatchReporter};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use url::Url;

use crate::fetcher::validate_url;

pub const WEBHOOK_URL_ENV: &str = "HARVEST_WEBHOOK_URL";
const DEFAULT_USERNAME: &str = "Scraper Logger";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub webhook_url: Url,
    pub username: String,
}

impl AlertConfig {
    /// Parse the value of `HARVEST_WEBHOOK_URL`.
    ///
    /// Unset or blank disables alerts silently; an invalid URL is logged
    /// and also disables them.
    pub fn from_value(value: Option<&str>) -> Option<Self> {
        let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
        match validate_url(raw) {
            Ok(webhook_url) => Some(Self {
                webhook_url,
                username: DEFAULT_USERNAME.to_string(),
            }),
            Err(e) => {
                tracing::error!(error = %e, "Ignoring {WEBHOOK_URL_ENV}; alerts disabled");
                None
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    text: &'a str,
}

/// Posts messages to a webhook.
#[derive(Clone)]
pub struct WebhookAlerter {
    client: Client,
    config: AlertConfig,
}

impl WebhookAlerter {
    pub fn new(config: AlertConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub async fn send(&self, text: &str) -> Result<(), AppError> {
        let payload = WebhookPayload {
            username: &self.config.username,
            text,
        };

        let response = self
            .client
            .post(self.config.webhook_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(SEND_TIMEOUT.as_secs())
                } else {
                    AppError::NetworkError(format!("Webhook unreachable: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "Webhook returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

/// Reporter that forwards every event to `inner` and queues alert messages
/// for the webhook.
#[derive(Clone)]
pub struct AlertingReporter<R: BatchReporter> {
    inner: R,
    sender: Option<UnboundedSender<String>>,
}

impl<R: BatchReporter> AlertingReporter<R> {
    /// Wrap `inner`. Without an alerter the reporter only forwards, and the
    /// returned dispatcher has nothing to do.
    pub fn new(inner: R, alerter: Option<WebhookAlerter>) -> (Self, AlertDispatcher) {
        match alerter {
            Some(alerter) => {
                let (sender, receiver) = mpsc::unbounded_channel();
                let handle = tokio::spawn(dispatch(alerter, receiver));
                (
                    Self {
                        inner,
                        sender: Some(sender),
                    },
                    AlertDispatcher {
                        handle: Some(handle),
                    },
                )
            }
            None => (
                Self {
                    inner,
                    sender: None,
                },
                AlertDispatcher { handle: None },
            ),
        }
    }

    pub fn is_alerting(&self) -> bool {
        self.sender.is_some()
    }
}

impl<R: BatchReporter> BatchReporter for AlertingReporter<R> {
    fn report(&self, event: BatchEvent<'_>) {
        if let (Some(sender), Some(message)) = (&self.sender, event.alert_message()) {
            // Receiver only goes away after shutdown.
            let _ = sender.send(message);
        }
        self.inner.report(event);
    }
}

/// Background task that delivers queued alerts.
pub struct AlertDispatcher {
    handle: Option<JoinHandle<DispatchStats>>,
}

/// Delivery counts, returned by [`AlertDispatcher::shutdown`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: usize,
    pub failed: usize,
}

impl AlertDispatcher {
    /// Wait for queued alerts to be delivered.
    ///
    /// The queue closes once every [`AlertingReporter`] clone has been
    /// dropped, so drop them first. Gives up after a bounded wait.
    pub async fn shutdown(self) -> DispatchStats {
        let Some(mut handle) = self.handle else {
            return DispatchStats::default();
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Alert dispatcher stopped unexpectedly");
                DispatchStats::default()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                    "Pending alerts not delivered before shutdown"
                );
                handle.abort();
                DispatchStats::default()
            }
        }
    }
}

async fn dispatch(
    alerter: WebhookAlerter,
    mut receiver: UnboundedReceiver<String>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(message) = receiver.recv().await {
        match alerter.send(&message).await {
            Ok(()) => stats.sent += 1,
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(error = %e, "Failed to deliver alert");
            }
        }
    }
    stats
}
