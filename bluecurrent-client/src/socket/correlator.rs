//! Correlation of inbound messages with a caller's expectation
//!
//! A wait filters its own subscription for one message kind. `ERROR` frames
//! fail the wait whatever it was filtering for; other kinds are skipped.

use std::time::Duration;

use tracing::{debug, trace};

use super::messages::InboundMessage;
use super::queue::{FanoutQueue, Subscription};
use crate::error::{ClientError, Result};

impl Subscription {
    /// Wait for the next message tagged `kind`, bounded by `timeout` overall
    pub async fn expect(&mut self, kind: &str, timeout: Duration) -> Result<InboundMessage> {
        let wait = async {
            loop {
                let message = self.recv().await?;
                if message.is_error() {
                    debug!(expected = kind, "Error frame while awaiting reply");
                    return Err(ClientError::Protocol(message.into_inner()));
                }
                if message.kind() == Some(kind) {
                    return Ok(message);
                }
                trace!(expected = kind, got = ?message.kind(), "Discarding message");
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                kind: kind.to_string(),
                after: timeout,
            }),
        }
    }
}

/// Open a subscription and wait for `kind`; the subscription ends with the call
pub async fn await_message(
    queue: &FanoutQueue,
    kind: &str,
    timeout: Duration,
) -> Result<InboundMessage> {
    let mut subscription = queue.subscribe();
    subscription.expect(kind, timeout).await
}
