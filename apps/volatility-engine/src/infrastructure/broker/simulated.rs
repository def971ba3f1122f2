//! Simulated Broker
//!
//! In-process `BrokerPort` for paper trading and tests. Submissions follow a
//! script of behaviors (accept, hang past the caller's timeout, fail) and
//! accepted orders are filled at their limit price through the fill channel.
//! Resubmitting a client order id returns the original acknowledgement.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::application::ports::{BrokerError, BrokerPort, OrderAck, SubmitOrderRequest};
use crate::domain::order::FillNotification;
use crate::domain::shared::{BrokerOrderId, FillId, OrderId, Timestamp};

/// How the next submission is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBehavior {
    /// Acknowledge and fill per the fill mode.
    Accept,
    /// Never answer within the caller's timeout.
    Hang,
    /// Fail with the given error.
    Fail(BrokerError),
}

/// How accepted orders fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// One fill for the whole quantity.
    Full,
    /// Fill in up to `chunks` executions.
    Partial {
        /// Number of executions.
        chunks: u32,
    },
    /// Leave orders working.
    Resting,
}

/// Scripted in-process broker.
#[derive(Debug)]
pub struct SimulatedBroker {
    fills: mpsc::Sender<FillNotification>,
    script: Mutex<VecDeque<SubmitBehavior>>,
    fill_mode: Mutex<FillMode>,
    hang: Duration,
    accepted: Mutex<HashMap<OrderId, BrokerOrderId>>,
    working: Mutex<HashMap<BrokerOrderId, SubmitOrderRequest>>,
    cancels: Mutex<Vec<BrokerOrderId>>,
    submit_calls: AtomicU32,
}

impl SimulatedBroker {
    /// Broker that fills accepted orders in full.
    #[must_use]
    pub fn new(fills: mpsc::Sender<FillNotification>) -> Self {
        Self {
            fills,
            script: Mutex::new(VecDeque::new()),
            fill_mode: Mutex::new(FillMode::Full),
            hang: Duration::from_secs(30),
            accepted: Mutex::new(HashMap::new()),
            working: Mutex::new(HashMap::new()),
            cancels: Mutex::new(Vec::new()),
            submit_calls: AtomicU32::new(0),
        }
    }

    /// How long a `Hang` submission blocks.
    #[must_use]
    pub const fn with_hang(mut self, hang: Duration) -> Self {
        self.hang = hang;
        self
    }

    /// Queue behaviors for the next submissions. Unscripted calls accept.
    pub fn script(&self, behaviors: impl IntoIterator<Item = SubmitBehavior>) {
        self.script.lock().extend(behaviors);
    }

    /// Change how accepted orders fill.
    pub fn set_fill_mode(&self, mode: FillMode) {
        *self.fill_mode.lock() = mode;
    }

    /// Number of `submit_order` calls received.
    #[must_use]
    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Broker ids cancelled so far.
    #[must_use]
    pub fn cancels(&self) -> Vec<BrokerOrderId> {
        self.cancels.lock().clone()
    }

    /// Requests still working at the broker.
    #[must_use]
    pub fn working(&self) -> Vec<SubmitOrderRequest> {
        self.working.lock().values().cloned().collect()
    }

    async fn send_fills(&self, request: &SubmitOrderRequest) {
        let chunks = match *self.fill_mode.lock() {
            FillMode::Full => 1,
            FillMode::Partial { chunks } => chunks.clamp(1, request.quantity),
            FillMode::Resting => return,
        };
        let base = request.quantity / chunks;
        let mut remaining = request.quantity;
        for i in 0..chunks {
            let quantity = if i + 1 == chunks { remaining } else { base };
            remaining -= quantity;
            let fill = FillNotification {
                fill_id: FillId::generate(),
                order_id: request.client_order_id.clone(),
                quantity,
                price: request.limit_price,
                timestamp: Timestamp::now(),
            };
            if self.fills.send(fill).await.is_err() {
                tracing::warn!(order_id = %request.client_order_id, "Fill channel closed");
                return;
            }
        }
    }
}

#[async_trait]
impl BrokerPort for SimulatedBroker {
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(SubmitBehavior::Accept);

        match behavior {
            SubmitBehavior::Hang => {
                tokio::time::sleep(self.hang).await;
                Err(BrokerError::Timeout {
                    elapsed_ms: u64::try_from(self.hang.as_millis()).unwrap_or(u64::MAX),
                })
            }
            SubmitBehavior::Fail(error) => Err(error),
            SubmitBehavior::Accept => {
                let existing = self
                    .accepted
                    .lock()
                    .get(&request.client_order_id)
                    .cloned();
                if let Some(broker_order_id) = existing {
                    return Ok(OrderAck {
                        broker_order_id,
                        client_order_id: request.client_order_id,
                    });
                }

                let broker_order_id = BrokerOrderId::new(format!("SIM-{}", uuid::Uuid::new_v4()));
                self.accepted
                    .lock()
                    .insert(request.client_order_id.clone(), broker_order_id.clone());
                tracing::debug!(
                    order_id = %request.client_order_id,
                    broker_order_id = %broker_order_id,
                    contract = %request.contract,
                    quantity = request.quantity,
                    "Simulated order accepted"
                );
                self.send_fills(&request).await;
                if *self.fill_mode.lock() == FillMode::Resting {
                    self.working
                        .lock()
                        .insert(broker_order_id.clone(), request.clone());
                }
                Ok(OrderAck {
                    broker_order_id,
                    client_order_id: request.client_order_id,
                })
            }
        }
    }

    async fn cancel_order(&self, broker_order_id: &BrokerOrderId) -> Result<(), BrokerError> {
        self.cancels.lock().push(broker_order_id.clone());
        if self.working.lock().remove(broker_order_id).is_none() {
            return Err(BrokerError::OrderNotFound {
                order_id: broker_order_id.to_string(),
            });
        }
        Ok(())
    }
}
