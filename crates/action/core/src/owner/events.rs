//! Started/stopped notifications.
//!
//! Listeners are invoked synchronously, in registration order, on the side
//! where the transition was applied: the authority fires on admission, a
//! replica fires when it replays replicated state.

use std::fmt;

use crate::state::{EntityRef, OwnerId, Role, SimTime};
use crate::tag::Tag;

/// Which transition an event reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionEventKind {
    Started,
    Stopped,
}

/// Payload delivered to listeners: the owner and the action that moved.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionEvent {
    pub kind: ActionEventKind,
    pub owner: OwnerId,
    pub role: Role,
    pub action: Tag,
    pub instigator: EntityRef,
    pub time: SimTime,
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Boxed listener callback.
pub type Listener = Box<dyn FnMut(&ActionEvent) + Send>;

/// Observer list for both transition kinds.
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    started: Vec<(SubscriptionId, Listener)>,
    stopped: Vec<(SubscriptionId, Listener)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: ActionEventKind, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        match kind {
            ActionEventKind::Started => self.started.push((id, listener)),
            ActionEventKind::Stopped => self.stopped.push((id, listener)),
        }
        id
    }

    /// Removes a listener. Returns false if the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.started.len() + self.stopped.len();
        self.started.retain(|(sid, _)| *sid != id);
        self.stopped.retain(|(sid, _)| *sid != id);
        before != self.started.len() + self.stopped.len()
    }

    pub fn emit(&mut self, event: &ActionEvent) {
        let listeners = match event.kind {
            ActionEventKind::Started => &mut self.started,
            ActionEventKind::Stopped => &mut self.stopped,
        };
        for (_, listener) in listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.started.len() + self.stopped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("started", &self.started.len())
            .field("stopped", &self.stopped.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn event(kind: ActionEventKind) -> ActionEvent {
        ActionEvent {
            kind,
            owner: OwnerId(1),
            role: Role::Authority,
            action: Tag::new("Action.Dash").unwrap(),
            instigator: EntityRef(1),
            time: SimTime::ZERO,
        }
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();

        for label in ["first", "second"] {
            let log = Arc::clone(&log);
            listeners.subscribe(
                ActionEventKind::Started,
                Box::new(move |_| log.lock().unwrap().push(label)),
            );
        }

        listeners.emit(&event(ActionEventKind::Started));
        listeners.emit(&event(ActionEventKind::Stopped));

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let hits = Arc::new(Mutex::new(0));
        let mut listeners = Listeners::new();

        let hits_a = Arc::clone(&hits);
        let a = listeners.subscribe(
            ActionEventKind::Stopped,
            Box::new(move |_| *hits_a.lock().unwrap() += 1),
        );
        let hits_b = Arc::clone(&hits);
        listeners.subscribe(
            ActionEventKind::Stopped,
            Box::new(move |_| *hits_b.lock().unwrap() += 10),
        );

        assert!(listeners.unsubscribe(a));
        assert!(!listeners.unsubscribe(a));

        listeners.emit(&event(ActionEventKind::Stopped));
        assert_eq!(*hits.lock().unwrap(), 10);
        assert_eq!(listeners.len(), 1);
    }
}
