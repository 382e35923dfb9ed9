//! Registry of active UI bridge sessions
//!
//! Sessions live in a sharded concurrent map so lookups, touches and the
//! background reaper never contend on a single lock. A session is treated as
//! gone as soon as it has been idle longer than the timeout, whether or not the
//! reaper has evicted it yet.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SessionConfig;

use super::model::{ContextOperation, TransportKey, UiNotification, UiSession};

/// Hands notifications to whatever owns the connection behind a [`TransportKey`].
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, transport: &TransportKey, session_id: &str, notification: &UiNotification);
}

/// Logs notifications without sending them anywhere.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, transport: &TransportKey, session_id: &str, notification: &UiNotification) {
        debug!(
            transport = transport.as_str(),
            session_id,
            method = notification.method,
            "ui notification dispatched"
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundNotification {
    pub transport: TransportKey,
    pub session_id: String,
    pub notification: UiNotification,
}

impl NotificationSink for mpsc::UnboundedSender<OutboundNotification> {
    fn deliver(&self, transport: &TransportKey, session_id: &str, notification: &UiNotification) {
        let outbound = OutboundNotification {
            transport: transport.clone(),
            session_id: session_id.to_string(),
            notification: notification.clone(),
        };
        if self.send(outbound).is_err() {
            warn!(
                transport = transport.as_str(),
                session_id, "notification receiver dropped"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the sink; wire delivery is up to the transport.
    Attempted,
    /// Session is live but has no transport attached.
    NoTransport,
    UnknownSession,
}

impl Delivery {
    pub fn attempted(self) -> bool {
        matches!(self, Self::Attempted)
    }
}

struct RegistryInner {
    sessions: DashMap<String, UiSession>,
    timeout_ms: u64,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
}

impl RegistryInner {
    fn reap_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut evicted = 0;
        self.sessions.retain(|session_id, session| {
            if session.is_expired(now, self.timeout_ms) {
                debug!(session_id = %session_id, "expiring ui session");
                evicted += 1;
                false
            } else {
                true
            }
        });

        if evicted > 0 {
            info!(
                evicted,
                remaining = self.sessions.len(),
                "cleaned up expired ui sessions"
            );
        }
        evicted
    }
}

pub struct UiSessionRegistry {
    inner: Arc<RegistryInner>,
    cleanup_interval: Duration,
    reaper: Mutex<Option<CancellationToken>>,
}

impl UiSessionRegistry {
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_sink(config, clock, Arc::new(TracingSink))
    }

    pub fn with_sink(
        config: SessionConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let defaults = SessionConfig::default();
        let timeout_ms = if config.timeout_ms > 0 {
            config.timeout_ms
        } else {
            defaults.timeout_ms
        };
        let cleanup_interval_ms = if config.cleanup_interval_ms > 0 {
            config.cleanup_interval_ms
        } else {
            defaults.cleanup_interval_ms
        };

        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                timeout_ms,
                clock,
                sink,
            }),
            cleanup_interval: Duration::from_millis(cleanup_interval_ms),
            reaper: Mutex::new(None),
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.inner.timeout_ms
    }

    /// Number of stored sessions, including expired ones not yet reaped.
    pub fn size(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_running(&self) -> bool {
        self.reaper.lock().is_some()
    }

    /// Spawns the periodic reaper on the current tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut reaper = self.reaper.lock();
        if reaper.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let inner = Arc::clone(&self.inner);
        let period = self.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        inner.reap_expired();
                    }
                }
            }
            debug!("ui session reaper exited");
        });

        *reaper = Some(token);
        info!(
            timeout_ms = self.inner.timeout_ms,
            cleanup_interval_ms = period.as_millis() as u64,
            "ui session registry started"
        );
    }

    /// Cancels the reaper and drops every session. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(token) = self.reaper.lock().take() {
            token.cancel();
            info!("ui session registry stopped");
        }
        self.inner.sessions.clear();
    }

    pub fn register(&self, resource_uri: Option<String>, tool_name: Option<String>) -> UiSession {
        let session = UiSession::new(
            Uuid::new_v4().to_string(),
            resource_uri,
            tool_name,
            self.inner.clock.now_ms(),
        );
        self.inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        debug!(
            session_id = %session.session_id,
            resource_uri = ?session.resource_uri,
            tool_name = ?session.tool_name,
            created_at = ?session.created_at(),
            "registered ui session"
        );
        session
    }

    pub fn get(&self, session_id: &str) -> Option<UiSession> {
        let now = self.inner.clock.now_ms();
        self.inner
            .sessions
            .get(session_id)
            .filter(|session| !session.is_expired(now, self.inner.timeout_ms))
            .map(|session| session.value().clone())
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }

    /// Like [`get`](Self::get), and restarts the idle clock of a live session.
    pub fn get_and_touch(&self, session_id: &str) -> Option<UiSession> {
        let now = self.inner.clock.now_ms();
        let mut session = self.inner.sessions.get_mut(session_id)?;
        if session.is_expired(now, self.inner.timeout_ms) {
            return None;
        }
        session.last_activity_ms = session.last_activity_ms.max(now);
        Some(session.value().clone())
    }

    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.inner.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id, "removed ui session");
        }
        removed
    }

    pub fn attach_transport(&self, session_id: &str, transport: TransportKey) -> bool {
        let now = self.inner.clock.now_ms();
        match self.inner.sessions.get_mut(session_id) {
            Some(mut session) if !session.is_expired(now, self.inner.timeout_ms) => {
                session.transport = Some(transport);
                true
            }
            _ => false,
        }
    }

    /// Applies a context update to a live session and returns the stored context.
    pub fn update_model_context(
        &self,
        session_id: &str,
        context: Value,
        operation: ContextOperation,
    ) -> Option<Value> {
        let now = self.inner.clock.now_ms();
        let mut session = self.inner.sessions.get_mut(session_id)?;
        if session.is_expired(now, self.inner.timeout_ms) {
            return None;
        }

        let merged = match (operation, session.model_context.take(), context) {
            (ContextOperation::Merge, Some(Value::Object(mut existing)), Value::Object(update)) => {
                existing.extend(update);
                Value::Object(existing)
            }
            (_, _, context) => context,
        };
        session.model_context = Some(merged.clone());
        Some(merged)
    }

    /// Evicts idle sessions now instead of waiting for the next reaper tick.
    pub fn reap_expired(&self) -> usize {
        self.inner.reap_expired()
    }

    pub fn send_notification(&self, session_id: &str, notification: &UiNotification) -> Delivery {
        let Some(session) = self.get(session_id) else {
            return Delivery::UnknownSession;
        };

        match session.transport.as_ref() {
            Some(transport) => {
                self.inner.sink.deliver(transport, session_id, notification);
                Delivery::Attempted
            }
            None => {
                debug!(session_id, method = notification.method, "ui session has no transport");
                Delivery::NoTransport
            }
        }
    }

    pub fn notify_tool_input(&self, session_id: &str, tool_name: &str, arguments: Value) -> Delivery {
        self.send_notification(session_id, &UiNotification::tool_input(tool_name, arguments))
    }

    pub fn notify_tool_result(&self, session_id: &str, tool_name: &str, result: Value) -> Delivery {
        self.send_notification(session_id, &UiNotification::tool_result(tool_name, result))
    }

    pub fn notify_tool_error(&self, session_id: &str, tool_name: &str, error: &str) -> Delivery {
        self.send_notification(session_id, &UiNotification::tool_error(tool_name, error))
    }
}

impl Drop for UiSessionRegistry {
    fn drop(&mut self) {
        if let Some(token) = self.reaper.get_mut().take() {
            token.cancel();
        }
    }
}
