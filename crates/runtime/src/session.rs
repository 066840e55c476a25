//! Deterministic session: one authoritative owner and its replicas.
//!
//! A [`Session`] simulates a single character as seen by several peers. The
//! authority runs the real gates; each replica holds its own copy of the
//! owner and only ever changes through replicated updates. Peers talk through
//! [`LoopbackLink`]s, one per direction and replica.
//!
//! Everything advances in discrete ticks via [`Session::step`]. Given the same
//! inputs in the same order, every run produces the same states and events.
//!
//! ```text
//! replica --requests--> authority --updates--> replica
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use action_content::{ActionCatalog, SessionConfig};
use action_core::{
    ActionError, ActionOwner, ActionRequest, ActionStateUpdate, ActionStatus, BehaviorRegistry,
    EntityRef, OwnerId, ReplicationChannel, RequestKind, Role, SimTime, Tag, TagSet,
};

use crate::api::{Result, RuntimeError};
use crate::events::{ActionEventRecord, Event, EventBus, ReplicationEvent};
use crate::replication::LoopbackLink;

/// Owner id of the simulated character on every peer.
pub const CHARACTER: OwnerId = OwnerId(1);

/// The local player, instigator of every input.
pub const PLAYER: EntityRef = EntityRef(1);

/// A participant in the session.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum PeerId {
    Authority,
    Replica(usize),
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerId::Authority => write!(f, "authority"),
            PeerId::Replica(index) => write!(f, "replica-{}", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid peer `{0}`, expected `authority` or `replica-N`")]
pub struct ParsePeerError(String);

impl FromStr for PeerId {
    type Err = ParsePeerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "authority" {
            return Ok(PeerId::Authority);
        }
        s.strip_prefix("replica-")
            .and_then(|index| index.parse().ok())
            .map(PeerId::Replica)
            .ok_or_else(|| ParsePeerError(s.to_string()))
    }
}

/// What happened to a start/stop issued on a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The authority ran the transition.
    Applied,
    /// A replica queued the request for the authority.
    Forwarded,
    /// The authority refused it.
    Refused(ActionError),
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Applied => write!(f, "applied"),
            Dispatch::Forwarded => write!(f, "forwarded to authority"),
            Dispatch::Refused(error) => write!(f, "refused: {}", error),
        }
    }
}

/// Read-only view of one peer's owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerState {
    pub peer: PeerId,
    pub role: Role,
    pub time: SimTime,
    pub active_tags: TagSet,
    pub actions: Vec<ActionStatus>,
}

impl PeerState {
    fn of(peer: PeerId, owner: &ActionOwner) -> Self {
        Self {
            peer,
            role: owner.role(),
            time: owner.now(),
            active_tags: owner.active_tags().to_tag_set(),
            actions: owner.statuses(),
        }
    }

    pub fn running(&self) -> impl Iterator<Item = &Tag> {
        self.actions
            .iter()
            .filter(|status| status.run_state.is_running)
            .map(|status| &status.name)
    }

    /// Same running actions and same active tags as `other`.
    pub fn agrees_with(&self, other: &PeerState) -> bool {
        self.active_tags == other.active_tags && self.running().eq(other.running())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub tick: u64,
    pub peers: Vec<PeerState>,
}

impl SessionSnapshot {
    /// First replica that disagrees with the authority, if any.
    pub fn divergent(&self) -> Option<&PeerState> {
        let (authority, replicas) = self.peers.split_first()?;
        replicas.iter().find(|state| !state.agrees_with(authority))
    }
}

struct ReplicaPeer {
    owner: ActionOwner,
    downlink: LoopbackLink<ActionStateUpdate>,
    uplink: LoopbackLink<ActionRequest>,
}

/// Authority updates fan out to every replica's downlink.
struct Fanout<'a>(&'a mut [ReplicaPeer]);

impl ReplicationChannel for Fanout<'_> {
    fn replicate(&mut self, update: &ActionStateUpdate) {
        for replica in self.0.iter_mut() {
            replica.downlink.replicate(update);
        }
    }
}

pub struct Session {
    config: SessionConfig,
    catalog: ActionCatalog,
    registry: BehaviorRegistry,
    authority: ActionOwner,
    replicas: Vec<ReplicaPeer>,
    tick: u64,
    bus: Option<EventBus>,
}

impl Session {
    /// Builds the authority and `config.replicas` replicas from `catalog`.
    pub fn new(
        config: SessionConfig,
        catalog: ActionCatalog,
        registry: BehaviorRegistry,
    ) -> Result<Self> {
        let authority =
            catalog.build_owner(CHARACTER, Role::Authority, config.owner.clone(), &registry)?;

        let mut session = Self {
            config,
            catalog,
            registry,
            authority,
            replicas: Vec::new(),
            tick: 0,
            bus: None,
        };
        for _ in 0..session.config.replicas {
            session.add_replica()?;
        }

        info!(
            actions = session.catalog.len(),
            replicas = session.replicas.len(),
            latency_ticks = session.config.latency_ticks,
            "session created"
        );
        Ok(session)
    }

    /// Publishes every owner event and all replication traffic on `bus`.
    ///
    /// Peers joining later are bridged as well.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        bridge(&mut self.authority, PeerId::Authority, &bus);
        for (index, replica) in self.replicas.iter_mut().enumerate() {
            bridge(&mut replica.owner, PeerId::Replica(index), &bus);
        }
        self.bus = Some(bus);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Authority time.
    pub fn now(&self) -> SimTime {
        self.authority.now()
    }

    pub fn authority(&self) -> &ActionOwner {
        &self.authority
    }

    pub fn replica(&self, index: usize) -> Option<&ActionOwner> {
        self.replicas.get(index).map(|replica| &replica.owner)
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + use<> {
        std::iter::once(PeerId::Authority).chain((0..self.replicas.len()).map(PeerId::Replica))
    }

    pub fn owner(&self, peer: PeerId) -> Result<&ActionOwner> {
        match peer {
            PeerId::Authority => Ok(&self.authority),
            PeerId::Replica(index) => self
                .replica(index)
                .ok_or(RuntimeError::UnknownPeer { peer }),
        }
    }

    fn owner_mut(&mut self, peer: PeerId) -> Result<&mut ActionOwner> {
        match peer {
            PeerId::Authority => Ok(&mut self.authority),
            PeerId::Replica(index) => self
                .replicas
                .get_mut(index)
                .map(|replica| &mut replica.owner)
                .ok_or(RuntimeError::UnknownPeer { peer }),
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Resolves `input` through the binding table and dispatches it on `peer`.
    pub fn press(&mut self, peer: PeerId, input: &str) -> Result<Dispatch> {
        let binding = self
            .config
            .bindings
            .resolve(input)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownInput {
                input: input.to_string(),
            })?;

        debug!(%peer, input, command = %binding.command, action = %binding.action, "input");
        self.dispatch(peer, binding.command, &binding.action)
    }

    pub fn start(&mut self, peer: PeerId, action: &Tag) -> Result<Dispatch> {
        self.dispatch(peer, RequestKind::Start, action)
    }

    pub fn stop(&mut self, peer: PeerId, action: &Tag) -> Result<Dispatch> {
        self.dispatch(peer, RequestKind::Stop, action)
    }

    pub fn dispatch(&mut self, peer: PeerId, kind: RequestKind, action: &Tag) -> Result<Dispatch> {
        let owner = self.owner_mut(peer)?;
        let result = match kind {
            RequestKind::Start => owner.try_start_action_by_name(PLAYER, action),
            RequestKind::Stop => owner.try_stop_action_by_name(PLAYER, action),
        };

        Ok(match result {
            Ok(()) => Dispatch::Applied,
            Err(ActionError::NotAuthority { .. }) => Dispatch::Forwarded,
            Err(error) => Dispatch::Refused(error),
        })
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Adds a replica mid-session. It converges once the snapshot sent on its
    /// downlink is delivered.
    pub fn join_replica(&mut self) -> Result<PeerId> {
        let index = self.add_replica()?;
        let snapshot = self.authority.replication_snapshot();

        let replica = &mut self.replicas[index];
        for update in &snapshot {
            replica.downlink.send(update)?;
        }

        let peer = PeerId::Replica(index);
        info!(%peer, actions = snapshot.len(), "replica joined");
        publish(
            &self.bus,
            Event::Replication(ReplicationEvent::ReplicaJoined {
                peer,
                actions: snapshot.len(),
            }),
        );
        Ok(peer)
    }

    fn add_replica(&mut self) -> Result<usize> {
        let mut owner = self.catalog.build_owner(
            CHARACTER,
            Role::Replica,
            self.config.owner.clone(),
            &self.registry,
        )?;
        owner.set_time(self.authority.now());

        let index = self.replicas.len();
        if let Some(bus) = &self.bus {
            bridge(&mut owner, PeerId::Replica(index), bus);
        }

        let mut downlink = LoopbackLink::new(self.config.latency_ticks);
        let mut uplink = LoopbackLink::new(self.config.latency_ticks);
        downlink.set_tick(self.tick);
        uplink.set_tick(self.tick);

        self.replicas.push(ReplicaPeer {
            owner,
            downlink,
            uplink,
        });
        Ok(index)
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    /// Advances one tick.
    ///
    /// Order within a tick: clocks advance, the authority stops actions whose
    /// duration elapsed, replica requests go onto their uplinks, the authority
    /// executes delivered requests, authority updates go onto every downlink,
    /// replicas apply delivered updates. Undecodable packets are logged by the
    /// link and skipped.
    pub fn step(&mut self) -> Result<()> {
        let Self {
            config,
            authority,
            replicas,
            tick,
            bus,
            ..
        } = self;

        *tick += 1;
        authority.advance_time(config.tick_seconds);
        for replica in replicas.iter_mut() {
            replica.owner.advance_time(config.tick_seconds);
            replica.downlink.set_tick(*tick);
            replica.uplink.set_tick(*tick);
        }
        trace!(tick = *tick, now = %authority.now(), "step");

        for action in authority.expire(EntityRef::WORLD) {
            debug!(tick = *tick, %action, "duration elapsed");
        }

        for replica in replicas.iter_mut() {
            for request in replica.owner.take_requests() {
                if let Err(error) = replica.uplink.send(&request) {
                    warn!(action = %request.action, %error, "request dropped");
                }
            }
        }

        for (index, replica) in replicas.iter_mut().enumerate() {
            let from = PeerId::Replica(index);
            for request in replica.uplink.deliver() {
                match authority.handle_request(&request) {
                    Ok(admitted) => {
                        debug!(
                            %from,
                            kind = %request.kind,
                            action = %request.action,
                            admitted,
                            "request handled"
                        );
                        publish(
                            bus,
                            Event::Replication(ReplicationEvent::RequestHandled {
                                from,
                                request,
                                admitted,
                            }),
                        );
                    }
                    Err(error) => warn!(%from, %error, "forwarded request rejected"),
                }
            }
        }

        let sent = authority.flush_replication(&mut Fanout(replicas.as_mut_slice()));
        if sent > 0 {
            trace!(tick = *tick, sent, "updates replicated");
        }

        for (index, replica) in replicas.iter_mut().enumerate() {
            let peer = PeerId::Replica(index);
            for update in replica.downlink.deliver() {
                match replica.owner.apply_replicated(&update) {
                    Ok(outcome) => publish(
                        bus,
                        Event::Replication(ReplicationEvent::UpdateApplied {
                            peer,
                            update,
                            outcome,
                        }),
                    ),
                    Err(error) => warn!(%peer, action = %update.action, %error, "update rejected"),
                }
            }
        }

        Ok(())
    }

    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// No queued requests, no unflushed updates and nothing in flight.
    pub fn is_quiescent(&self) -> bool {
        self.authority.pending_replication() == 0
            && self.replicas.iter().all(|replica| {
                replica.owner.pending_requests() == 0
                    && replica.downlink.is_idle()
                    && replica.uplink.is_idle()
            })
    }

    /// Steps until quiescent, at most `max_ticks` times. Returns the ticks run.
    pub fn settle(&mut self, max_ticks: u64) -> Result<u64> {
        let mut ran = 0;
        while ran < max_ticks && !self.is_quiescent() {
            self.step()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Every replica runs the same actions and holds the same tags as the authority.
    pub fn converged(&self) -> bool {
        self.snapshot().divergent().is_none()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn peer_state(&self, peer: PeerId) -> Result<PeerState> {
        self.owner(peer).map(|owner| PeerState::of(peer, owner))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut peers = vec![PeerState::of(PeerId::Authority, &self.authority)];
        peers.extend(
            self.replicas
                .iter()
                .enumerate()
                .map(|(index, replica)| PeerState::of(PeerId::Replica(index), &replica.owner)),
        );
        SessionSnapshot {
            tick: self.tick,
            peers,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tick", &self.tick)
            .field("authority", &self.authority)
            .field("replicas", &self.replicas.len())
            .finish_non_exhaustive()
    }
}

fn bridge(owner: &mut ActionOwner, peer: PeerId, bus: &EventBus) {
    let started = bus.clone();
    owner.on_action_started(move |event| {
        started.publish(Event::Action(ActionEventRecord {
            peer,
            event: event.clone(),
        }))
    });

    let stopped = bus.clone();
    owner.on_action_stopped(move |event| {
        stopped.publish(Event::Action(ActionEventRecord {
            peer,
            event: event.clone(),
        }))
    });
}

fn publish(bus: &Option<EventBus>, event: Event) {
    if let Some(bus) = bus {
        bus.publish(event);
    }
}
