//! Application Layer
//!
//! The application layer orchestrates domain logic. It defines:
//!
//! - **Ports**: Interfaces to market data, the broker and the audit trail
//! - **Services**: The tick pipeline, risk gate and execution coordinator
//! - **Retry**: Backoff policy for broker calls

pub mod ports;
pub mod retry;
pub mod services;

pub use ports::*;
pub use services::*;
