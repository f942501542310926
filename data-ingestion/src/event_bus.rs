// Realtime event bus
// Best-effort push of completed analysis cycles to currently connected sessions.
// No acknowledgement, retry or backlog: a session that connects after a publish
// never sees that event and has to read the history store instead.
// Sessions can also send requests; replies go back to the requesting session only.

use chrono::{DateTime, Utc};
use common::AnalysisCycle;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound realtime event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum RealtimeEvent {
    AnalysisUpdate(AnalysisCycle),
    /// Reply to one session's analysis request
    AnalysisResult(serde_json::Value),
    AnalysisError { message: String },
}

/// Inbound request from one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub session_id: Uuid,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub id: Uuid,
    pub connected_at: DateTime<Utc>,
}

struct SessionEntry {
    info: SessionInfo,
    direct: mpsc::UnboundedSender<Arc<RealtimeEvent>>,
}

/// Broadcast hub for live sessions
pub struct RealtimePublisher {
    sender: broadcast::Sender<Arc<RealtimeEvent>>,
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
    requests: mpsc::Sender<SessionRequest>,
    request_rx: Mutex<Option<mpsc::Receiver<SessionRequest>>>,
}

impl RealtimePublisher {
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        let (requests, request_rx) = mpsc::channel(channel_capacity.max(1));
        Self {
            sender,
            sessions: Arc::new(DashMap::new()),
            requests,
            request_rx: Mutex::new(Some(request_rx)),
        }
    }

    /// Inbound session requests. There is one consumer; later calls get `None`.
    pub fn take_requests(&self) -> Option<mpsc::Receiver<SessionRequest>> {
        self.request_rx.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Deliver an event to one session only.
    ///
    /// Returns false when the session has already disconnected.
    pub fn send_to(&self, session_id: Uuid, event: RealtimeEvent) -> bool {
        match self.sessions.get(&session_id) {
            Some(entry) => entry.direct.send(Arc::new(event)).is_ok(),
            None => {
                debug!(session_id = %session_id, "Session gone, reply dropped");
                false
            }
        }
    }

    /// Register a new live session; it receives only events published from now on
    pub fn connect(&self) -> Session {
        let info = SessionInfo {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
        };
        let (direct, direct_rx) = mpsc::unbounded_channel();
        self.sessions.insert(
            info.id,
            SessionEntry {
                info: info.clone(),
                direct,
            },
        );
        info!(session_id = %info.id, "Session connected");

        Session {
            info,
            receiver: self.sender.subscribe(),
            direct: direct_rx,
            requests: self.requests.clone(),
            registry: Arc::clone(&self.sessions),
        }
    }

    /// Push a completed cycle to every connected session.
    ///
    /// Returns how many sessions the event was handed to; zero when nobody is listening.
    pub fn publish(&self, cycle: &AnalysisCycle) -> usize {
        let event = Arc::new(RealtimeEvent::AnalysisUpdate(cycle.clone()));
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(receivers, timestamp = %cycle.timestamp, "Published analysis update");
                receivers
            }
            Err(_) => {
                debug!("No live sessions, analysis update dropped");
                0
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|entry| entry.value().info.clone()).collect()
    }
}

/// A connected realtime session; dropping it disconnects
pub struct Session {
    info: SessionInfo,
    receiver: broadcast::Receiver<Arc<RealtimeEvent>>,
    direct: mpsc::UnboundedReceiver<Arc<RealtimeEvent>>,
    requests: mpsc::Sender<SessionRequest>,
    registry: Arc<DashMap<Uuid, SessionEntry>>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Send a request on behalf of this session; the reply arrives through `recv`.
    ///
    /// Returns false when nobody is serving requests.
    pub async fn request(&self, payload: serde_json::Value) -> bool {
        let request = SessionRequest {
            session_id: self.info.id,
            payload,
        };
        if self.requests.send(request).await.is_err() {
            warn!(session_id = %self.info.id, "No request handler, request dropped");
            return false;
        }
        true
    }

    /// Wait for the next event, broadcast or direct. Returns `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<Arc<RealtimeEvent>> {
        loop {
            tokio::select! {
                biased;
                Some(event) = self.direct.recv() => return Some(event),
                result = self.receiver.recv() => match result {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(session_id = %self.info.id, skipped, "Session lagging, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Non-blocking poll for an already delivered event
    pub fn try_recv(&mut self) -> Option<Arc<RealtimeEvent>> {
        if let Ok(event) = self.direct.try_recv() {
            return Some(event);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(session_id = %self.info.id, skipped, "Session lagging, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.remove(&self.info.id);
        debug!(session_id = %self.info.id, "Session disconnected");
    }
}
