//! The per-entity action container.
//!
//! [`ActionOwner`] exclusively owns its actions and the entity's live tag
//! container. External callers (input handling, AI) only reach actions by
//! name through [`ActionOwner::start_action_by_name`] and
//! [`ActionOwner::stop_action_by_name`]; no action reference leaves the owner.
//!
//! The owner is the only place where replicated state is originated
//! (authority) or replayed (replica), and the only fan-out point for
//! started/stopped events.

pub mod events;
pub mod replication;


use std::collections::BTreeSet;

use tracing::{debug, trace, warn};

use crate::action::{Action, ActionDef, ActionError, ActionStatus, BehaviorRegistry, BindError};
use crate::config::OwnerConfig;
use crate::state::{EntityRef, OwnerId, Role, SimClock, SimTime};
use crate::tag::{ActiveTags, Tag};

use events::{ActionEvent, ActionEventKind, Listeners, SubscriptionId};
use replication::{
    ActionRequest, ActionStateUpdate, ReplicationChannel, ReplicationError, ReplicationOutcome,
    RequestKind,
};

/// Owner-side state an action touches while transitioning.
///
/// Split from the action list so an action can be borrowed mutably together
/// with the context it mutates.
#[derive(Debug)]
pub(crate) struct OwnerContext {
    pub(crate) id: OwnerId,
    pub(crate) role: Role,
    pub(crate) config: OwnerConfig,
    pub(crate) clock: SimClock,
    pub(crate) tags: ActiveTags,
    pub(crate) listeners: Listeners,
    /// Authority updates not yet handed to a replication channel.
    pub(crate) outbox: Vec<ActionStateUpdate>,
}

impl OwnerContext {
    pub(crate) fn emit(&mut self, kind: ActionEventKind, action: &Tag, instigator: EntityRef) {
        let event = ActionEvent {
            kind,
            owner: self.id,
            role: self.role,
            action: action.clone(),
            instigator,
            time: self.clock.now(),
        };
        self.listeners.emit(&event);
    }
}

/// Owns a fixed set of actions and the entity's active tags.
#[derive(Debug)]
pub struct ActionOwner {
    actions: Vec<Action>,
    ctx: OwnerContext,
    initialized: bool,
    /// Requests made on a replica, waiting to be forwarded.
    requests: Vec<ActionRequest>,
}

impl ActionOwner {
    pub fn new(id: OwnerId, role: Role) -> Self {
        Self::with_config(id, role, OwnerConfig::default())
    }

    pub fn with_config(id: OwnerId, role: Role, config: OwnerConfig) -> Self {
        Self {
            actions: Vec::new(),
            ctx: OwnerContext {
                id,
                role,
                config,
                clock: SimClock::default(),
                tags: ActiveTags::new(),
                listeners: Listeners::new(),
                outbox: Vec::new(),
            },
            initialized: false,
            requests: Vec::new(),
        }
    }

    /// Builds and initializes an owner from catalog definitions.
    pub fn from_defs<I>(
        id: OwnerId,
        role: Role,
        config: OwnerConfig,
        defs: I,
        registry: &BehaviorRegistry,
    ) -> Result<Self, BindError>
    where
        I: IntoIterator<Item = ActionDef>,
    {
        let actions = defs
            .into_iter()
            .map(|def| Action::from_def(def, registry))
            .collect::<Result<Vec<_>, _>>()?;

        let mut owner = Self::with_config(id, role, config);
        owner.initialize(actions)?;
        Ok(owner)
    }

    /// Binds `actions` to this owner. Allowed once.
    ///
    /// On error nothing is kept and the owner stays uninitialized.
    pub fn initialize<I>(&mut self, actions: I) -> Result<(), BindError>
    where
        I: IntoIterator<Item = Action>,
    {
        if self.initialized {
            return Err(BindError::AlreadyInitialized { owner: self.ctx.id });
        }

        let mut actions: Vec<Action> = actions.into_iter().collect();
        if actions.len() > OwnerConfig::MAX_ACTIONS {
            return Err(BindError::TooManyActions {
                count: actions.len(),
                max: OwnerConfig::MAX_ACTIONS,
            });
        }

        let mut seen = BTreeSet::new();
        for action in &actions {
            if !seen.insert(action.name().clone()) {
                return Err(BindError::DuplicateName {
                    action: action.name().clone(),
                });
            }
        }

        for action in &mut actions {
            action.bind(self.ctx.id)?;
        }

        debug!(
            owner = %self.ctx.id,
            role = %self.ctx.role,
            count = actions.len(),
            "owner initialized"
        );

        self.actions = actions;
        self.initialized = true;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> OwnerId {
        self.ctx.id
    }

    pub fn role(&self) -> Role {
        self.ctx.role
    }

    pub fn is_authority(&self) -> bool {
        self.ctx.role.is_authority()
    }

    pub fn config(&self) -> &OwnerConfig {
        &self.ctx.config
    }

    pub fn active_tags(&self) -> &ActiveTags {
        &self.ctx.tags
    }

    pub fn now(&self) -> SimTime {
        self.ctx.clock.now()
    }

    /// Advances this owner's simulation clock.
    pub fn advance_time(&mut self, seconds: f64) {
        self.ctx.clock.advance(seconds);
    }

    pub fn set_time(&mut self, now: SimTime) {
        self.ctx.clock.set(now);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action names in initialization order.
    pub fn action_names(&self) -> impl Iterator<Item = &Tag> {
        self.actions.iter().map(Action::name)
    }

    pub fn running_actions(&self) -> impl Iterator<Item = &Tag> {
        self.actions
            .iter()
            .filter(|action| action.is_running())
            .map(Action::name)
    }

    pub fn is_running(&self, name: &Tag) -> bool {
        self.find(name).is_some_and(Action::is_running)
    }

    pub fn action_status(&self, name: &Tag) -> Option<ActionStatus> {
        self.find(name).map(Action::status)
    }

    pub fn statuses(&self) -> Vec<ActionStatus> {
        self.actions.iter().map(Action::status).collect()
    }

    /// Seconds since `name` last started, if it ever did.
    pub fn elapsed(&self, name: &Tag) -> Option<f64> {
        let now = self.now();
        self.find(name).and_then(|action| action.elapsed(now))
    }

    // ========================================================================
    // Name-based dispatch
    // ========================================================================

    /// Evaluates the start gate for `name` without side effects.
    pub fn can_start(&self, instigator: EntityRef, name: &Tag) -> Result<(), ActionError> {
        self.find(name)
            .ok_or_else(|| ActionError::NotFound {
                action: name.clone(),
            })?
            .check_start(&self.ctx, instigator)
    }

    /// Starts the action called `name` if it exists and passes the gate.
    ///
    /// On a replica nothing changes locally: the request is queued for the
    /// authority (see [`ActionOwner::take_requests`]) and
    /// [`ActionError::NotAuthority`] is returned.
    pub fn try_start_action_by_name(
        &mut self,
        instigator: EntityRef,
        name: &Tag,
    ) -> Result<(), ActionError> {
        let Self {
            actions,
            ctx,
            requests,
            ..
        } = self;

        let action = actions
            .iter_mut()
            .find(|action| action.name() == name)
            .ok_or_else(|| ActionError::NotFound {
                action: name.clone(),
            })?;

        if !ctx.role.is_authority() {
            debug!(owner = %ctx.id, action = %name, %instigator, "start forwarded to authority");
            requests.push(ActionRequest {
                owner: ctx.id,
                kind: RequestKind::Start,
                instigator,
                action: name.clone(),
            });
            return Err(ActionError::NotAuthority {
                action: name.clone(),
            });
        }

        if let Err(error) = action.check_start(ctx, instigator) {
            trace!(owner = %ctx.id, action = %name, %error, "start rejected");
            return Err(error);
        }

        action.start(ctx, instigator);
        Ok(())
    }

    /// Boolean form of [`ActionOwner::try_start_action_by_name`].
    pub fn start_action_by_name(&mut self, instigator: EntityRef, name: &Tag) -> bool {
        self.try_start_action_by_name(instigator, name).is_ok()
    }

    /// Stops the running action called `name`.
    pub fn try_stop_action_by_name(
        &mut self,
        instigator: EntityRef,
        name: &Tag,
    ) -> Result<(), ActionError> {
        let Self {
            actions,
            ctx,
            requests,
            ..
        } = self;

        let Some(action) = actions.iter_mut().find(|action| action.name() == name) else {
            return Err(ActionError::NotFound {
                action: name.clone(),
            });
        };

        if !ctx.role.is_authority() {
            debug!(owner = %ctx.id, action = %name, %instigator, "stop forwarded to authority");
            requests.push(ActionRequest {
                owner: ctx.id,
                kind: RequestKind::Stop,
                instigator,
                action: name.clone(),
            });
            return Err(ActionError::NotAuthority {
                action: name.clone(),
            });
        }

        if !action.is_running() {
            trace!(owner = %ctx.id, action = %name, "stop ignored, not running");
            return Err(ActionError::NotRunning {
                action: name.clone(),
            });
        }

        action.stop(ctx, instigator);
        Ok(())
    }

    /// Boolean form of [`ActionOwner::try_stop_action_by_name`].
    pub fn stop_action_by_name(&mut self, instigator: EntityRef, name: &Tag) -> bool {
        self.try_stop_action_by_name(instigator, name).is_ok()
    }

    /// Executes a request forwarded from a replica.
    ///
    /// Returns whether the authority admitted it. Gate rejections are logged
    /// and reported as `Ok(false)`.
    pub fn handle_request(&mut self, request: &ActionRequest) -> Result<bool, ReplicationError> {
        if !self.is_authority() {
            return Err(ReplicationError::RequestOnReplica { owner: self.ctx.id });
        }
        if request.owner != self.ctx.id {
            return Err(ReplicationError::OwnerMismatch {
                expected: self.ctx.id,
                received: request.owner,
            });
        }

        let (instigator, name) = (request.instigator, &request.action);
        let result = match request.kind {
            RequestKind::Start => self.try_start_action_by_name(instigator, name),
            RequestKind::Stop => self.try_stop_action_by_name(instigator, name),
        };

        match result {
            Ok(()) => Ok(true),
            Err(error) => {
                debug!(
                    owner = %self.ctx.id,
                    kind = %request.kind,
                    action = %request.action,
                    %error,
                    "forwarded request refused"
                );
                Ok(false)
            }
        }
    }

    /// Stops every running action whose duration has elapsed.
    ///
    /// Authority only; replicas learn about the stop through replication.
    /// Returns the names of the stopped actions in declaration order.
    pub fn expire(&mut self, instigator: EntityRef) -> Vec<Tag> {
        let Self { actions, ctx, .. } = self;
        if !ctx.role.is_authority() {
            return Vec::new();
        }

        let now = ctx.clock.now();
        let mut expired = Vec::new();
        for action in actions.iter_mut().filter(|action| action.is_expired(now)) {
            debug!(owner = %ctx.id, action = %action.name(), %now, "action expired");
            action.stop(ctx, instigator);
            expired.push(action.name().clone());
        }
        expired
    }

    /// Drains requests queued on this replica.
    pub fn take_requests(&mut self) -> Vec<ActionRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn on_action_started<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ActionEvent) + Send + 'static,
    {
        self.ctx
            .listeners
            .subscribe(ActionEventKind::Started, Box::new(listener))
    }

    pub fn on_action_stopped<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ActionEvent) + Send + 'static,
    {
        self.ctx
            .listeners
            .subscribe(ActionEventKind::Stopped, Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.ctx.listeners.unsubscribe(id)
    }

    // ========================================================================
    // Replication
    // ========================================================================

    /// Replica callback for a replicated state change.
    ///
    /// Updates with a revision not newer than the last applied one are
    /// dropped as stale. A newer update whose value equals the local state is
    /// recorded without replaying anything. Otherwise the transition is
    /// replayed from the replicated running flag, without gating.
    pub fn apply_replicated(
        &mut self,
        update: &ActionStateUpdate,
    ) -> Result<ReplicationOutcome, ReplicationError> {
        let Self { actions, ctx, .. } = self;

        if ctx.role.is_authority() {
            return Err(ReplicationError::AuthorityRejectsReplication { owner: ctx.id });
        }
        if update.owner != ctx.id {
            return Err(ReplicationError::OwnerMismatch {
                expected: ctx.id,
                received: update.owner,
            });
        }

        let action = actions
            .iter_mut()
            .find(|action| action.name() == &update.action)
            .ok_or_else(|| ReplicationError::UnknownAction {
                owner: ctx.id,
                action: update.action.clone(),
            })?;

        let last = action.revision();
        if update.revision <= last {
            debug!(
                owner = %ctx.id,
                action = %update.action,
                revision = update.revision,
                last,
                "stale update dropped"
            );
            return Ok(ReplicationOutcome::Stale);
        }
        if update.revision > last + 1 {
            warn!(
                owner = %ctx.id,
                action = %update.action,
                revision = update.revision,
                last,
                "replication gap, applying latest state"
            );
        }

        if action.run_state() == update.run_state {
            action.record_revision(update.revision, update.start_time);
            return Ok(ReplicationOutcome::Unchanged);
        }

        action.on_state_replicated(ctx, update.run_state, update.revision, update.start_time);
        Ok(ReplicationOutcome::Applied)
    }

    /// Current state of every action, for replicas joining mid-session.
    pub fn replication_snapshot(&self) -> Vec<ActionStateUpdate> {
        self.actions
            .iter()
            .map(|action| action.update(self.ctx.id))
            .collect()
    }

    pub fn pending_replication(&self) -> usize {
        self.ctx.outbox.len()
    }

    /// Hands pending updates to `channel` in the order they were produced.
    pub fn flush_replication<C>(&mut self, channel: &mut C) -> usize
    where
        C: ReplicationChannel + ?Sized,
    {
        let pending = std::mem::take(&mut self.ctx.outbox);
        for update in &pending {
            channel.replicate(update);
        }
        pending.len()
    }

    /// Drains pending updates, oldest first.
    pub fn take_replication(&mut self) -> Vec<ActionStateUpdate> {
        std::mem::take(&mut self.ctx.outbox)
    }

    fn find(&self, name: &Tag) -> Option<&Action> {
        self.actions.iter().find(|action| action.name() == name)
    }
}
