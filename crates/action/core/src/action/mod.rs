//! A single named unit of start/stop behavior.
//!
//! An [`Action`] is owned by exactly one [`ActionOwner`](crate::ActionOwner)
//! and is only reachable through it. The lifecycle is a two-state machine:
//!
//! ```text
//! Idle --start (admitted)--> Active --stop--> Idle
//! ```
//!
//! On the authority transitions pass the start gate first. On a
//! replica they are replayed from replicated state without any gate.

mod behavior;
mod error;

pub use behavior::{ActionBehavior, ActionView, BehaviorRegistry, Cooldown, NoopBehavior};
pub use error::{ActionError, BindError};

use std::fmt;

use tracing::{debug, trace};

use crate::owner::OwnerContext;
use crate::owner::events::ActionEventKind;
use crate::owner::replication::ActionStateUpdate;
use crate::state::{EntityRef, OwnerId, RunState, SimTime};
use crate::tag::{Tag, TagSet};

/// Static definition of an action, typically loaded from a content catalog.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionDef {
    /// Dispatch name, unique within one owner.
    pub name: Tag,
    /// Applied to the owner while the action runs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub grants_tags: TagSet,
    /// Any of these on the owner prevents starting.
    #[cfg_attr(feature = "serde", serde(default))]
    pub blocked_tags: TagSet,
    /// Key into a [`BehaviorRegistry`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub behavior: Option<String>,
    /// Seconds after which the authority stops the action on its own.
    /// `None` runs until stopped.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration: Option<f64>,
}

impl ActionDef {
    pub fn new(name: Tag) -> Self {
        Self {
            name,
            grants_tags: TagSet::new(),
            blocked_tags: TagSet::new(),
            behavior: None,
            duration: None,
        }
    }

    pub fn grants(mut self, tags: TagSet) -> Self {
        self.grants_tags = tags;
        self
    }

    pub fn blocked_by(mut self, tags: TagSet) -> Self {
        self.blocked_tags = tags;
        self
    }

    pub fn with_behavior(mut self, key: impl Into<String>) -> Self {
        self.behavior = Some(key.into());
        self
    }

    pub fn lasting(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// Read-only snapshot of an action, safe to hand outside the owner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionStatus {
    pub name: Tag,
    pub run_state: RunState,
    pub start_time: Option<SimTime>,
    pub revision: u64,
}

/// Runtime instance of an [`ActionDef`].
pub struct Action {
    def: ActionDef,
    run_state: RunState,
    start_time: Option<SimTime>,
    owner: Option<OwnerId>,
    /// Whether `grants_tags` currently sit in the owner's tag container.
    grants_applied: bool,
    revision: u64,
    behavior: Box<dyn ActionBehavior>,
}

impl Action {
    pub fn new(def: ActionDef) -> Self {
        Self::with_behavior(def, Box::new(NoopBehavior))
    }

    pub fn with_behavior(def: ActionDef, behavior: Box<dyn ActionBehavior>) -> Self {
        Self {
            def,
            run_state: RunState::IDLE,
            start_time: None,
            owner: None,
            grants_applied: false,
            revision: 0,
            behavior,
        }
    }

    /// Instantiates `def`, resolving its behavior key through `registry`.
    pub fn from_def(def: ActionDef, registry: &BehaviorRegistry) -> Result<Self, BindError> {
        let behavior = match def.behavior.as_deref() {
            None => Box::new(NoopBehavior) as Box<dyn ActionBehavior>,
            Some(key) => registry
                .create(key)
                .ok_or_else(|| BindError::UnknownBehavior {
                    action: def.name.clone(),
                    behavior: key.to_string(),
                })?,
        };
        Ok(Self::with_behavior(def, behavior))
    }

    pub fn name(&self) -> &Tag {
        &self.def.name
    }

    pub fn def(&self) -> &ActionDef {
        &self.def
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Authority start time. On replicas this is the replicated value.
    pub fn start_time(&self) -> Option<SimTime> {
        self.start_time
    }

    /// Seconds since the last start, for duration and cooldown logic.
    pub fn elapsed(&self, now: SimTime) -> Option<f64> {
        self.start_time.map(|started| now.since(started))
    }

    /// Running with a duration that has fully elapsed at `now`.
    pub fn is_expired(&self, now: SimTime) -> bool {
        match (self.def.duration, self.elapsed(now)) {
            (Some(duration), Some(elapsed)) => self.is_running() && elapsed >= duration,
            _ => false,
        }
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> ActionStatus {
        ActionStatus {
            name: self.def.name.clone(),
            run_state: self.run_state,
            start_time: self.start_time,
            revision: self.revision,
        }
    }

    /// Binds this action to `owner`. An action belongs to one owner for life.
    pub(crate) fn bind(&mut self, owner: OwnerId) -> Result<(), BindError> {
        match self.owner {
            Some(bound_to) => Err(BindError::AlreadyBound {
                action: self.def.name.clone(),
                bound_to,
            }),
            None => {
                self.owner = Some(owner);
                Ok(())
            }
        }
    }

    /// The start gate. Pure: no side effects.
    ///
    /// Base checks (already running, blocked tag present) always apply; the
    /// behavior may only add rejections on top.
    pub(crate) fn check_start(
        &self,
        ctx: &OwnerContext,
        instigator: EntityRef,
    ) -> Result<(), ActionError> {
        if self.is_running() {
            return Err(ActionError::AlreadyRunning {
                action: self.def.name.clone(),
            });
        }

        if ctx.tags.has_any(&self.def.blocked_tags) {
            let blocking = self
                .def
                .blocked_tags
                .iter()
                .filter(|tag| ctx.tags.has(tag))
                .cloned()
                .collect();
            return Err(ActionError::Blocked {
                action: self.def.name.clone(),
                blocking,
            });
        }

        let view = view_of(&self.def, self.start_time, ctx);
        if !self.behavior.can_start(&view, instigator) {
            return Err(ActionError::Rejected {
                action: self.def.name.clone(),
            });
        }

        Ok(())
    }

    /// Applies the start effects. Does not re-check the gate.
    ///
    /// Order: grant tags, flip the run state, capture start time (authority),
    /// broadcast, then the behavior hook. Listeners therefore observe the tag
    /// set already updated.
    pub(crate) fn start(&mut self, ctx: &mut OwnerContext, instigator: EntityRef) {
        debug!(
            owner = %ctx.id,
            role = %ctx.role,
            action = %self.def.name,
            %instigator,
            "action started"
        );

        if !self.grants_applied {
            ctx.tags.append(&self.def.grants_tags);
            self.grants_applied = true;
        }

        self.run_state = RunState::running(instigator);

        if ctx.role.is_authority() {
            self.start_time = Some(ctx.clock.now());
            self.publish(ctx);
        }

        ctx.emit(ActionEventKind::Started, &self.def.name, instigator);

        let view = view_of(&self.def, self.start_time, ctx);
        self.behavior.on_started(&view, instigator);
    }

    /// Applies the stop effects.
    ///
    /// Without `strict_stop` a second stop rewrites the state and broadcasts
    /// again, but never removes the granted tags twice.
    pub(crate) fn stop(&mut self, ctx: &mut OwnerContext, instigator: EntityRef) {
        if ctx.config.strict_stop && !self.is_running() {
            trace!(
                owner = %ctx.id,
                action = %self.def.name,
                "stop ignored, action idle"
            );
            return;
        }

        debug!(
            owner = %ctx.id,
            role = %ctx.role,
            action = %self.def.name,
            %instigator,
            "action stopped"
        );

        if self.grants_applied {
            ctx.tags.remove(&self.def.grants_tags);
            self.grants_applied = false;
        }

        self.run_state = RunState::stopped(instigator);

        if ctx.role.is_authority() {
            self.publish(ctx);
        }

        ctx.emit(ActionEventKind::Stopped, &self.def.name, instigator);

        let view = view_of(&self.def, self.start_time, ctx);
        self.behavior.on_stopped(&view, instigator);
    }

    /// Replica-side replay of a replicated state change.
    ///
    /// The transition is derived from `incoming.is_running` alone; no gate is
    /// evaluated. Afterwards the local state mirrors the replicated value.
    pub(crate) fn on_state_replicated(
        &mut self,
        ctx: &mut OwnerContext,
        incoming: RunState,
        revision: u64,
        start_time: Option<SimTime>,
    ) {
        self.revision = revision;
        self.start_time = start_time;

        let instigator = incoming.instigator.unwrap_or(EntityRef::WORLD);
        if incoming.is_running {
            self.start(ctx, instigator);
        } else {
            self.stop(ctx, instigator);
        }

        self.run_state = incoming;
    }

    /// Accepts a replicated revision without replaying anything.
    pub(crate) fn record_revision(&mut self, revision: u64, start_time: Option<SimTime>) {
        self.revision = revision;
        self.start_time = start_time;
    }

    /// Current state as a replication record.
    pub(crate) fn update(&self, owner: OwnerId) -> ActionStateUpdate {
        ActionStateUpdate {
            owner,
            action: self.def.name.clone(),
            revision: self.revision,
            run_state: self.run_state,
            start_time: self.start_time,
        }
    }

    fn publish(&mut self, ctx: &mut OwnerContext) {
        self.revision += 1;
        ctx.outbox.push(self.update(ctx.id));
    }
}

// Borrows only the definition so the behavior can be borrowed mutably alongside.
fn view_of<'a>(
    def: &'a ActionDef,
    start_time: Option<SimTime>,
    ctx: &'a OwnerContext,
) -> ActionView<'a> {
    ActionView {
        owner: ctx.id,
        role: ctx.role,
        now: ctx.clock.now(),
        action: &def.name,
        active_tags: &ctx.tags,
        start_time,
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.def.name)
            .field("run_state", &self.run_state)
            .field("start_time", &self.start_time)
            .field("owner", &self.owner)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}
