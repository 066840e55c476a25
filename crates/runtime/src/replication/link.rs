//! In-process stand-in for a network connection.
//!
//! Messages are encoded with bincode on send and decoded on delivery, so
//! everything crossing a link goes through the same serde path a real wire
//! would. Delivery is FIFO with a fixed latency in ticks, which keeps
//! per-action ordering intact.

use std::collections::VecDeque;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::error;

use action_core::{ActionStateUpdate, ReplicationChannel};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("failed to decode message: {0}")]
    Decode(String),
}

struct Packet {
    deliver_at: u64,
    payload: Vec<u8>,
}

/// One-directional, order-preserving link carrying `T`.
pub struct LoopbackLink<T> {
    latency_ticks: u32,
    now: u64,
    in_flight: VecDeque<Packet>,
    sent: u64,
    dropped: u64,
    _message: PhantomData<fn(T) -> T>,
}

impl<T> LoopbackLink<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(latency_ticks: u32) -> Self {
        Self {
            latency_ticks,
            now: 0,
            in_flight: VecDeque::new(),
            sent: 0,
            dropped: 0,
            _message: PhantomData,
        }
    }

    /// Moves the link's notion of time forward. Never goes backwards.
    pub fn set_tick(&mut self, tick: u64) {
        self.now = self.now.max(tick);
    }

    pub fn tick(&self) -> u64 {
        self.now
    }

    pub fn latency_ticks(&self) -> u32 {
        self.latency_ticks
    }

    /// Queues `message` for delivery `latency_ticks` after the current tick.
    pub fn send(&mut self, message: &T) -> Result<(), LinkError> {
        let payload = bincode::serialize(message).map_err(|e| LinkError::Encode(e.to_string()))?;
        self.in_flight.push_back(Packet {
            deliver_at: self.now + u64::from(self.latency_ticks),
            payload,
        });
        self.sent += 1;
        Ok(())
    }

    /// Pops every message due at or before the current tick, oldest first.
    ///
    /// A packet that fails to decode is logged, counted in
    /// [`LoopbackLink::dropped`] and skipped; the rest are still delivered.
    pub fn deliver(&mut self) -> Vec<T> {
        let mut delivered = Vec::new();
        while self
            .in_flight
            .front()
            .is_some_and(|packet| packet.deliver_at <= self.now)
        {
            let Some(packet) = self.in_flight.pop_front() else {
                break;
            };
            match Self::decode(&packet.payload) {
                Ok(message) => delivered.push(message),
                Err(error) => {
                    self.dropped += 1;
                    error!(tick = self.now, %error, "undecodable packet dropped");
                }
            }
        }
        delivered
    }

    fn decode(payload: &[u8]) -> Result<T, LinkError> {
        bincode::deserialize(payload).map_err(|e| LinkError::Decode(e.to_string()))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Total messages accepted since creation.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Packets discarded on delivery because they did not decode.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[cfg(test)]
    fn send_raw(&mut self, payload: Vec<u8>) {
        self.in_flight.push_back(Packet {
            deliver_at: self.now + u64::from(self.latency_ticks),
            payload,
        });
    }
}

impl ReplicationChannel for LoopbackLink<ActionStateUpdate> {
    fn replicate(&mut self, update: &ActionStateUpdate) {
        if let Err(error) = self.send(update) {
            error!(
                owner = %update.owner,
                action = %update.action,
                %error,
                "replication update dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use action_core::{EntityRef, OwnerId, RunState, SimTime, Tag};

    use super::*;

    fn update(revision: u64) -> ActionStateUpdate {
        ActionStateUpdate {
            owner: OwnerId(1),
            action: Tag::new("Action.Sprint").unwrap(),
            revision,
            run_state: RunState::running(EntityRef(1)),
            start_time: Some(SimTime(0.5)),
        }
    }

    #[test]
    fn holds_messages_for_latency_ticks() {
        let mut link = LoopbackLink::new(2);
        link.set_tick(10);
        link.replicate(&update(1));

        link.set_tick(11);
        assert!(link.deliver().is_empty());
        assert_eq!(link.in_flight(), 1);

        link.set_tick(12);
        assert_eq!(link.deliver(), vec![update(1)]);
        assert!(link.is_idle());
    }

    #[test]
    fn preserves_send_order() {
        let mut link = LoopbackLink::new(1);
        link.send(&update(1)).unwrap();
        link.set_tick(1);
        link.send(&update(2)).unwrap();
        link.send(&update(3)).unwrap();

        link.set_tick(5);
        let revisions: Vec<_> = link.deliver().iter().map(|u| u.revision).collect();
        assert_eq!(revisions, vec![1, 2, 3]);
        assert_eq!(link.sent(), 3);
    }

    #[test]
    fn undecodable_packet_is_skipped() {
        let mut link = LoopbackLink::new(0);
        link.send(&update(1)).unwrap();
        link.send_raw(vec![0xff]);
        link.send(&update(2)).unwrap();

        let revisions: Vec<_> = link.deliver().iter().map(|u| u.revision).collect();
        assert_eq!(revisions, vec![1, 2]);
        assert_eq!(link.dropped(), 1);
        assert!(link.is_idle());
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut link: LoopbackLink<ActionStateUpdate> = LoopbackLink::new(0);
        link.set_tick(4);
        link.set_tick(2);
        assert_eq!(link.tick(), 4);
    }
}
