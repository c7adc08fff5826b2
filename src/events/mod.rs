pub mod audit;
pub mod publisher;

// Re-export key types for convenience
pub use audit::{AuditError, AuditEvent, AuditSink, Auditor, TracingAuditSink};
pub use publisher::{EventPublisher, FleetEvent, PublishedEvent};
