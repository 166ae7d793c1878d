//! Outbound query correlation
//!
//! Every query gets a fresh id and a pending entry holding a oneshot sender.
//! Whichever of "matching response" and "timeout" removes the entry first
//! decides the outcome, so each query resolves exactly once. Responses for
//! ids that are no longer pending are dropped. The deadline is fixed when the
//! query is registered and also bounds a send stuck on a full transport.

use crate::message::{OutboundQuery, QueryResponse, QueryResult};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tomo_core::{CompanionId, Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct PendingQuery {
    issued_at: Instant,
    timeout: Duration,
    tx: oneshot::Sender<QueryResult>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingQuery>>>;

/// Removes a query's pending entry if its caller stops waiting
struct PendingGuard {
    pending: PendingMap,
    id: String,
    armed: bool,
}

impl PendingGuard {
    /// Take the entry for the caller. False if a response already claimed it.
    fn claim(&mut self) -> bool {
        self.armed = false;
        self.pending.lock().remove(&self.id).is_some()
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed && self.pending.lock().remove(&self.id).is_some() {
            debug!("Caller of query {} went away, entry removed", self.id);
        }
    }
}

/// Sends queries and matches their responses. Cheap to clone; clones share pending state.
#[derive(Clone)]
pub struct QueryCorrelator {
    transport: Arc<dyn Transport>,
    pending: PendingMap,
    default_timeout: Duration,
    speak_timeout: Duration,
}

impl QueryCorrelator {
    pub fn new(transport: Arc<dyn Transport>, default_timeout: Duration, speak_timeout: Duration) -> Self {
        Self {
            transport,
            pending: Arc::new(Mutex::new(HashMap::new())),
            default_timeout,
            speak_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send with the default timeout
    pub async fn send_default(&self, query: OutboundQuery) -> Result<QueryResult> {
        self.send(query, self.default_timeout).await
    }

    /// Send a query and wait for its response or `timeout`, whichever comes first.
    ///
    /// The timeout counts from issuance and covers the transport send as well.
    pub async fn send(&self, query: OutboundQuery, timeout: Duration) -> Result<QueryResult> {
        let (tx, mut rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;
        let id = self.register(tx, timeout);
        let mut guard = PendingGuard {
            pending: self.pending.clone(),
            id: id.clone(),
            armed: true,
        };

        let frame = query.to_frame(&id);
        debug!("Sending {} query {} from {}", query.query_type, id, query.from);

        let outcome = tokio::time::timeout_at(deadline, async {
            if let Err(e) = self.transport.send_json(&frame).await {
                warn!("Failed to send query {}: {}", id, e);
                return Err(e);
            }
            (&mut rx)
                .await
                .map_err(|_| Error::Transport(format!("Query {} was abandoned", id)))
        })
        .await;

        match outcome {
            Ok(Ok(result)) => {
                guard.disarm();
                Ok(result)
            }
            Ok(Err(e)) => {
                guard.claim();
                Err(e)
            }
            Err(_) => {
                if guard.claim() {
                    warn!(
                        "Query {} ({}) timed out after {} ms",
                        id,
                        query.query_type,
                        timeout.as_millis()
                    );
                    return Err(Error::Timeout {
                        id,
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                // The response claimed the entry just before the deadline
                rx.await
                    .map_err(|_| Error::Transport(format!("Query {} was abandoned", id)))
            }
        }
    }

    fn register(&self, tx: oneshot::Sender<QueryResult>, timeout: Duration) -> String {
        let mut pending = self.pending.lock();
        let mut id = Uuid::new_v4().to_string();
        while pending.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        pending.insert(
            id.clone(),
            PendingQuery {
                issued_at: Instant::now(),
                timeout,
                tx,
            },
        );
        id
    }

    /// Deliver a response to its waiting caller.
    ///
    /// Fails with `DuplicateResponse` when the id is not pending, e.g. a second
    /// response or one arriving after the timeout.
    pub fn resolve(&self, response: QueryResponse) -> Result<()> {
        let entry = self.pending.lock().remove(&response.id);
        let Some(entry) = entry else {
            warn!(
                "Dropping response for unknown or already resolved query {}",
                response.id
            );
            return Err(Error::DuplicateResponse(response.id));
        };

        debug!(
            "Query {} answered after {} ms (timeout {} ms)",
            response.id,
            entry.issued_at.elapsed().as_millis(),
            entry.timeout.as_millis()
        );
        if entry.tx.send(response.result).is_err() {
            info!("Caller of query {} stopped waiting", response.id);
        }
        Ok(())
    }

    /// Ask for the furniture list
    pub async fn objects(&self, from: CompanionId) -> Result<QueryResult> {
        self.send_default(OutboundQuery::objects(from)).await
    }

    /// Ask for the user's position
    pub async fn user(&self, from: CompanionId) -> Result<QueryResult> {
        self.send_default(OutboundQuery::user(from)).await
    }

    /// Speak a line; waits for playback to finish under the speak timeout
    pub async fn speak(
        &self,
        from: CompanionId,
        message: &str,
        emotion: Option<&str>,
    ) -> Result<QueryResult> {
        self.send(OutboundQuery::speak(from, message, emotion), self.speak_timeout)
            .await
    }
}
