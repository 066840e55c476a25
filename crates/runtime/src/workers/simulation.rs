//! Simulation worker that owns the [`Session`].
//!
//! Receives commands from [`RuntimeHandle`](crate::RuntimeHandle), applies
//! them to the session and replies on a oneshot channel. Owner events and
//! replication traffic reach subscribers through the session's event bus.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use action_core::{RequestKind, Tag};

use crate::api::Result;
use crate::session::{Dispatch, PeerId, PeerState, Session, SessionSnapshot};

/// Commands that can be sent to the simulation worker
pub enum Command {
    /// Resolve an input through the binding table and dispatch it.
    Press {
        peer: PeerId,
        input: String,
        reply: oneshot::Sender<Result<Dispatch>>,
    },
    /// Start or stop an action by name.
    Dispatch {
        peer: PeerId,
        kind: RequestKind,
        action: Tag,
        reply: oneshot::Sender<Result<Dispatch>>,
    },
    /// Advance the session. Replies with the tick reached.
    Step {
        ticks: u64,
        reply: oneshot::Sender<Result<u64>>,
    },
    /// Step until nothing is queued or in flight, bounded by `max_ticks`.
    Settle {
        max_ticks: u64,
        reply: oneshot::Sender<Result<u64>>,
    },
    /// Add a replica mid-session.
    JoinReplica {
        reply: oneshot::Sender<Result<PeerId>>,
    },
    /// Query one peer (read-only).
    QueryPeer {
        peer: PeerId,
        reply: oneshot::Sender<Result<PeerState>>,
    },
    /// Query every peer (read-only).
    QuerySnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Background task that processes session commands.
pub struct SimulationWorker {
    session: Session,
    command_rx: mpsc::Receiver<Command>,
}

impl SimulationWorker {
    pub fn new(session: Session, command_rx: mpsc::Receiver<Command>) -> Self {
        tracing::info!(
            replicas = session.replica_count(),
            actions = session.catalog().len(),
            "SimulationWorker initialized"
        );

        Self {
            session,
            command_rx,
        }
    }

    /// Main worker loop. Ends when every handle is dropped.
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }
        debug!(tick = self.session.tick(), "SimulationWorker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Press { peer, input, reply } => {
                let result = self.session.press(peer, &input);
                if reply.send(result).is_err() {
                    debug!("Press reply channel closed (caller dropped)");
                }
            }
            Command::Dispatch {
                peer,
                kind,
                action,
                reply,
            } => {
                let result = self.session.dispatch(peer, kind, &action);
                if reply.send(result).is_err() {
                    debug!("Dispatch reply channel closed (caller dropped)");
                }
            }
            Command::Step { ticks, reply } => {
                let result = self.session.run(ticks).map(|()| self.session.tick());
                if reply.send(result).is_err() {
                    debug!("Step reply channel closed (caller dropped)");
                }
            }
            Command::Settle { max_ticks, reply } => {
                let result = self.session.settle(max_ticks);
                if reply.send(result).is_err() {
                    debug!("Settle reply channel closed (caller dropped)");
                }
            }
            Command::JoinReplica { reply } => {
                let result = self.session.join_replica();
                if reply.send(result).is_err() {
                    debug!("JoinReplica reply channel closed (caller dropped)");
                }
            }
            Command::QueryPeer { peer, reply } => {
                if reply.send(self.session.peer_state(peer)).is_err() {
                    debug!("QueryPeer reply channel closed (caller dropped)");
                }
            }
            Command::QuerySnapshot { reply } => {
                if reply.send(self.session.snapshot()).is_err() {
                    debug!("QuerySnapshot reply channel closed (caller dropped)");
                }
            }
        }
    }
}
