//! Audit sink that writes structured `tracing` events on target `audit`.

use crate::application::ports::{AuditEvent, AuditSink};

/// Forwards every audit event to the log as one JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(
                target: "audit",
                sequence = event.sequence,
                kind = event.record.kind(),
                payload = %payload,
                "audit"
            ),
            Err(error) => tracing::warn!(
                target: "audit",
                sequence = event.sequence,
                kind = event.record.kind(),
                error = %error,
                "Audit event not serializable"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AuditRecord, AuditTrail};
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Capture(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_line_per_event() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let trail = AuditTrail::new(Arc::new(TracingAuditSink));
            trail.emit(AuditRecord::Alert {
                message: "retries exhausted".into(),
                order_id: None,
                contract: None,
            });
        });

        let output = String::from_utf8(capture.0.lock().clone()).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("sequence=1"));
        assert!(output.contains("retries exhausted"));
    }
}
