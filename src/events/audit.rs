//! Audit hook for template and ledger mutations.
//!
//! Delivery (shipping to an audit store) is external; the core only hands
//! events to an [`AuditSink`]. Sink failures and slow sinks never fail the
//! operation that produced the event.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity: String,
    pub entity_id: Uuid,
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        actor_id: Option<Uuid>,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: Uuid,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            actor_id,
            action: action.into(),
            entity: entity.into(),
            entity_id,
            metadata,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Audit delivery failed: {0}")]
pub struct AuditError(pub String);

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Default sink: writes audit events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            actor_id = event.actor_id.map(|id| id.to_string()),
            action = %event.action,
            entity = %event.entity,
            entity_id = %event.entity_id,
            metadata = %event.metadata,
            "📝 AUDIT"
        );
        Ok(())
    }
}

/// Bounded, fire-and-forget front for an [`AuditSink`].
#[derive(Clone)]
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
    timeout: Duration,
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    pub fn tracing(timeout: Duration) -> Self {
        Self::new(Arc::new(TracingAuditSink), timeout)
    }

    /// Hand an event to the sink. Errors and timeouts are logged and dropped.
    pub async fn record(&self, event: AuditEvent) {
        let action = event.action.clone();
        let entity_id = event.entity_id;
        match tokio::time::timeout(self.timeout, self.sink.record(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(
                action = %action,
                entity_id = %entity_id,
                error = %err,
                "Audit sink rejected event"
            ),
            Err(_) => tracing::warn!(
                action = %action,
                entity_id = %entity_id,
                timeout_ms = self.timeout.as_millis() as u64,
                "Audit sink timed out"
            ),
        }
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::tracing(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
            Err(AuditError("store offline".to_string()))
        }
    }

    struct SlowSink;

    #[async_trait]
    impl AuditSink for SlowSink {
        async fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<AuditEvent>>);

    #[async_trait]
    impl AuditSink for CollectingSink {
        async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
            self.0.lock().push(event);
            Ok(())
        }
    }

    fn event() -> AuditEvent {
        AuditEvent::new(
            None,
            "template.create",
            "task template",
            Uuid::new_v4(),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        Auditor::new(Arc::new(FailingSink), Duration::from_millis(50))
            .record(event())
            .await;
    }

    #[tokio::test]
    async fn test_slow_sink_is_cut_off() {
        Auditor::new(Arc::new(SlowSink), Duration::from_millis(50))
            .record(event())
            .await;
    }

    #[tokio::test]
    async fn test_events_reach_sink() {
        let sink = Arc::new(CollectingSink::default());
        Auditor::new(sink.clone(), Duration::from_millis(50))
            .record(event())
            .await;
        assert_eq!(sink.0.lock().len(), 1);
        assert_eq!(sink.0.lock()[0].action, "template.create");
    }
}
