//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers for
//! driving the session or streaming events from specific topics.
use tokio::sync::{broadcast, mpsc, oneshot};

use action_core::{RequestKind, Tag};

use super::errors::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::session::{Dispatch, PeerId, PeerState, SessionSnapshot};
use crate::workers::Command;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl RuntimeHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Press a bound input on `peer`.
    pub async fn press(&self, peer: PeerId, input: impl Into<String>) -> Result<Dispatch> {
        let input = input.into();
        self.request(|reply| Command::Press { peer, input, reply })
            .await?
    }

    pub async fn start_action(&self, peer: PeerId, action: Tag) -> Result<Dispatch> {
        self.request(|reply| Command::Dispatch {
            peer,
            kind: RequestKind::Start,
            action,
            reply,
        })
        .await?
    }

    pub async fn stop_action(&self, peer: PeerId, action: Tag) -> Result<Dispatch> {
        self.request(|reply| Command::Dispatch {
            peer,
            kind: RequestKind::Stop,
            action,
            reply,
        })
        .await?
    }

    /// Advance `ticks` ticks. Returns the session tick afterwards.
    pub async fn step(&self, ticks: u64) -> Result<u64> {
        self.request(|reply| Command::Step { ticks, reply }).await?
    }

    /// Run until every request and update has been delivered.
    pub async fn settle(&self, max_ticks: u64) -> Result<u64> {
        self.request(|reply| Command::Settle { max_ticks, reply })
            .await?
    }

    pub async fn join_replica(&self) -> Result<PeerId> {
        self.request(|reply| Command::JoinReplica { reply }).await?
    }

    pub async fn query_peer(&self, peer: PeerId) -> Result<PeerState> {
        self.request(|reply| Command::QueryPeer { peer, reply })
            .await?
    }

    pub async fn query_snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::QuerySnapshot { reply }).await
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Action` - Actions started/stopped on any peer
    /// - `Topic::Replication` - Updates applied and requests forwarded
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use runtime::Topic;
    ///
    /// let mut actions = handle.subscribe(Topic::Action);
    /// while let Ok(event) = actions.recv().await {
    ///     // Handle action events
    /// }
    /// ```
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
