use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use cascade_proto::CommandEnvelope;

use crate::error::{ClientError, ClientResult};

/// One decoded reply frame: envelope header plus its payload bytes.
#[derive(Clone, Debug)]
pub struct ReplyFrame {
    pub envelope: CommandEnvelope,
    pub payload: Bytes,
}

impl ReplyFrame {
    pub fn status(&self) -> i32 {
        self.envelope.status
    }
}

/// All frames of one finished transaction: intermediate data frames in
/// arrival order, then the terminal envelope.
#[derive(Debug)]
pub struct CompletionOutcome {
    pub data: Vec<ReplyFrame>,
    pub terminal: ReplyFrame,
}

impl CompletionOutcome {
    pub fn is_ok(&self) -> bool {
        self.terminal.status() == 0
    }
}

/// Routes reply frames back to the in-flight transaction that owns them.
///
/// Every transaction gets a unique id and a channel slot. A frame for an
/// unknown or already-finished transaction is a late reply and is dropped.
pub struct CompletionRegistry {
    next_trans: AtomicU64,
    slots: Mutex<HashMap<u64, mpsc::UnboundedSender<ReplyFrame>>>,
}

impl CompletionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_trans: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Allocate a transaction id and register its reply slot.
    pub fn begin(self: &Arc<Self>) -> Completion {
        let trans = self.next_trans.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.slots
            .lock()
            .expect("lock poisoned")
            .insert(trans, tx);
        Completion {
            trans,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Deliver a raw frame to its transaction, if still in flight.
    pub fn deliver(&self, frame: &[u8]) {
        let (envelope, payload) = match CommandEnvelope::decode(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "discarding undecodable frame");
                return;
            }
        };
        let trans = envelope.trans;
        let sender = {
            let slots = self.slots.lock().expect("lock poisoned");
            slots.get(&trans).cloned()
        };
        let frame = ReplyFrame {
            envelope,
            payload: Bytes::copy_from_slice(payload),
        };
        match sender {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    debug!(trans, "late reply discarded, waiter gone");
                }
            }
            None => debug!(trans, "late reply discarded, no such transaction"),
        }
    }

    fn finish(&self, trans: u64) {
        self.slots.lock().expect("lock poisoned").remove(&trans);
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.slots.lock().expect("lock poisoned").len()
    }
}

/// One in-flight transaction waiting for its reply frames.
///
/// Dropping the completion (finished or abandoned) unregisters the slot,
/// so frames arriving afterwards are discarded rather than queued forever.
pub struct Completion {
    trans: u64,
    rx: mpsc::UnboundedReceiver<ReplyFrame>,
    registry: Arc<CompletionRegistry>,
}

impl Completion {
    pub fn trans(&self) -> u64 {
        self.trans
    }

    /// Collect frames until the terminal one (MORE unset) arrives.
    ///
    /// The deadline covers the whole transaction, not one frame: a node
    /// streaming many MORE frames does not reset the clock.
    pub async fn wait(mut self, timeout: Duration, op: &'static str) -> ClientResult<CompletionOutcome> {
        let deadline = Instant::now() + timeout;
        let mut data = Vec::new();
        loop {
            let frame = match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    return Err(ClientError::Transport(format!(
                        "reply channel closed for transaction {}",
                        self.trans
                    )))
                }
                Err(_) => {
                    return Err(ClientError::Timeout {
                        op,
                        millis: timeout.as_millis() as u64,
                    })
                }
            };
            if frame.envelope.has_more() {
                data.push(frame);
            } else {
                return Ok(CompletionOutcome {
                    data,
                    terminal: frame,
                });
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.registry.finish(self.trans);
    }
}
