//! Long-wait alerts and the sinks that deliver them

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::identifier::QueueIdentifier;

/// Raised once per queue per evaluation cycle when its wait exceeds the
/// configured threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongWaitDetected {
    pub connection: String,
    pub queue: String,
    /// Observed wait in seconds
    pub seconds: u64,
}

impl LongWaitDetected {
    pub fn new(id: &QueueIdentifier, seconds: u64) -> Self {
        Self {
            connection: id.connection().to_string(),
            queue: id.queue().to_string(),
            seconds,
        }
    }

    pub fn identifier(&self) -> QueueIdentifier {
        QueueIdentifier::new(self.connection.clone(), self.queue.clone())
    }

    /// Human-readable summary used by log and webhook targets
    pub fn message(&self) -> String {
        format!(
            "Queue '{}' on connection '{}' has a wait time of {} seconds",
            self.queue, self.connection, self.seconds
        )
    }
}

/// Accepts long-wait alerts. Delivery guarantees are the sink's concern.
pub trait AlertSink: Send {
    fn emit(&self, alert: LongWaitDetected) -> Result<(), SinkError>;
}

impl<T: AlertSink + Sync + ?Sized> AlertSink for std::sync::Arc<T> {
    fn emit(&self, alert: LongWaitDetected) -> Result<(), SinkError> {
        (**self).emit(alert)
    }
}

/// Writes alerts to tracing
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn emit(&self, alert: LongWaitDetected) -> Result<(), SinkError> {
        tracing::warn!(
            connection = %alert.connection,
            queue = %alert.queue,
            seconds = alert.seconds,
            "Long wait detected: {}",
            alert.message()
        );
        Ok(())
    }
}

/// Hands alerts to an async consumer such as [`WebhookNotifier`]
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LongWaitDetected>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<LongWaitDetected>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LongWaitDetected>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl AlertSink for ChannelSink {
    fn emit(&self, alert: LongWaitDetected) -> Result<(), SinkError> {
        self.tx.send(alert).map_err(|_| SinkError::Closed)
    }
}

/// Emits to every sink in order, stopping at the first failure
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn AlertSink + Sync>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl AlertSink + Sync + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AlertSink for FanoutSink {
    fn emit(&self, alert: LongWaitDetected) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.emit(alert.clone())?;
        }
        Ok(())
    }
}

/// Posts alerts received from a [`ChannelSink`] to an HTTP webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Deliver alerts until every sender is dropped
    pub fn start(
        self,
        mut rx: mpsc::UnboundedReceiver<LongWaitDetected>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                if let Err(e) = self.send(&alert).await {
                    tracing::error!(
                        connection = %alert.connection,
                        queue = %alert.queue,
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
            tracing::info!("Webhook notifier stopped");
        })
    }

    /// Send one alert
    pub async fn send(&self, alert: &LongWaitDetected) -> Result<(), SinkError> {
        let payload = webhook_payload(alert, Utc::now());

        let mut request = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(SinkError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(
            queue = %alert.identifier(),
            url = %self.url,
            "Webhook notification sent"
        );

        Ok(())
    }
}

fn webhook_payload(alert: &LongWaitDetected, at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "event": "long_wait_detected",
        "connection": alert.connection,
        "queue": alert.queue,
        "seconds": alert.seconds,
        "message": alert.message(),
        "timestamp": at.to_rfc3339(),
    })
}

/// Alert delivery errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Alert channel closed")]
    Closed,

    #[error("Webhook error: {0}")]
    Webhook(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FailingSink;

    impl AlertSink for FailingSink {
        fn emit(&self, _alert: LongWaitDetected) -> Result<(), SinkError> {
            Err(SinkError::Webhook("down".to_string()))
        }
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<LongWaitDetected>>);

    impl AlertSink for Collecting {
        fn emit(&self, alert: LongWaitDetected) -> Result<(), SinkError> {
            self.0.lock().push(alert);
            Ok(())
        }
    }

    fn alert() -> LongWaitDetected {
        LongWaitDetected::new(&QueueIdentifier::new("redis", "test-queue-2"), 80)
    }

    #[test]
    fn test_alert_fields() {
        let alert = alert();
        assert_eq!(alert.connection, "redis");
        assert_eq!(alert.queue, "test-queue-2");
        assert_eq!(alert.identifier().to_string(), "redis:test-queue-2");
        assert!(alert.message().contains("80 seconds"));
    }

    #[test]
    fn test_log_sink_always_succeeds() {
        assert!(LogSink.emit(alert()).is_ok());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.emit(alert()).unwrap();
        assert_eq!(rx.recv().await, Some(alert()));

        drop(rx);
        assert!(matches!(sink.emit(alert()), Err(SinkError::Closed)));
    }

    #[test]
    fn test_fanout_stops_at_first_failure() {
        let before = Arc::new(Collecting::default());
        let after = Arc::new(Collecting::default());
        let fanout = FanoutSink::new()
            .with_sink(Arc::clone(&before))
            .with_sink(FailingSink)
            .with_sink(Arc::clone(&after));

        assert_eq!(fanout.len(), 3);
        assert!(fanout.emit(alert()).is_err());
        assert_eq!(before.0.lock().len(), 1);
        assert!(after.0.lock().is_empty());
    }

    #[test]
    fn test_webhook_payload() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let payload = webhook_payload(&alert(), at);

        assert_eq!(payload["event"], "long_wait_detected");
        assert_eq!(payload["queue"], "test-queue-2");
        assert_eq!(payload["seconds"], 80);
        assert_eq!(payload["timestamp"], "2024-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/alerts").with_header("X-Token", "t");
        let result = notifier.send(&alert()).await;
        assert!(matches!(result, Err(SinkError::Webhook(_))));
    }
}
