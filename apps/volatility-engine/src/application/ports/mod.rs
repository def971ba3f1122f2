//! Application Ports (Driven)
//!
//! Interfaces to market data, the broker and the audit trail.

mod audit_port;
mod broker_port;
mod quote_source_port;

pub use audit_port::{AuditEvent, AuditRecord, AuditSink, AuditTrail, NoOpAuditSink};
pub use broker_port::{BrokerError, BrokerPort, OrderAck, SubmitOrderRequest};
pub use quote_source_port::{MarketSnapshot, QuoteSource, QuoteSourceError};
