//! The message queue: the simulation's logical clock.
//!
//! Messages are kept in slots keyed by arrival time. Within a slot the
//! index of a message is its theta, so `(time, theta)` is a dense total
//! order. Every mutation here re-numbers the affected slot so that each
//! message's stored arrival always matches where it sits.

use crate::message::{Message, MessageId, Position, Time};
use std::collections::{BTreeMap, HashMap};

/// All messages of a run, delivered and pending, in delivery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageQueue {
    slots: BTreeMap<Time, Vec<MessageId>>,
    messages: HashMap<MessageId, Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages in the queue.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.contains_key(&id)
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.get_mut(&id)
    }

    /// Message ids arriving at `time`, in theta order.
    pub fn slot(&self, time: Time) -> &[MessageId] {
        self.slots.get(&time).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of messages arriving at `time`.
    pub fn slot_len(&self, time: Time) -> usize {
        self.slot(time).len()
    }

    /// Times that have at least one message, ascending.
    pub fn times(&self) -> impl Iterator<Item = Time> + '_ {
        self.slots.keys().copied()
    }

    /// Latest time holding a message.
    pub fn max_time(&self) -> Option<Time> {
        self.slots.keys().next_back().copied()
    }

    /// The message at `position`, if any.
    pub fn at(&self, position: Position) -> Option<&Message> {
        let id = self.slots.get(&position.time)?.get(position.theta)?;
        self.messages.get(id)
    }

    /// All messages in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> + '_ {
        self.slots
            .values()
            .flatten()
            .filter_map(|id| self.messages.get(id))
    }

    /// Messages strictly after `position`, in delivery order.
    pub fn iter_after(&self, position: Position) -> impl Iterator<Item = &Message> + '_ {
        self.slots
            .range(position.time..)
            .flat_map(|(_, slot)| slot.iter())
            .filter_map(|id| self.messages.get(id))
            .filter(move |message| message.arrival() > position)
    }

    /// First occupied position strictly after `position` (or the very
    /// first one when `position` is `None`).
    pub fn next_after(&self, position: Option<Position>) -> Option<Position> {
        let Some(current) = position else {
            return self.slots.keys().next().map(|time| Position::new(*time, 0));
        };
        if current.theta + 1 < self.slot_len(current.time) {
            return Some(Position::new(current.time, current.theta + 1));
        }
        let after = current.time.checked_add(1)?;
        self.slots
            .range(after..)
            .next()
            .map(|(time, _)| Position::new(*time, 0))
    }

    /// Last occupied position strictly before `position`.
    pub fn prev_before(&self, position: Position) -> Option<Position> {
        if position.theta > 0 {
            let len = self.slot_len(position.time);
            return Some(Position::new(position.time, (position.theta - 1).min(len.saturating_sub(1))));
        }
        self.slots
            .range(..position.time)
            .next_back()
            .map(|(time, slot)| Position::new(*time, slot.len().saturating_sub(1)))
    }

    /// Inserts `message` at `position`, shifting later messages of the slot.
    ///
    /// A theta beyond the end of the slot appends.
    pub(crate) fn insert_at(&mut self, mut message: Message, position: Position) -> Position {
        let id = message.id();
        let slot = self.slots.entry(position.time).or_default();
        let theta = position.theta.min(slot.len());
        slot.insert(theta, id);
        for (index, other) in slot.iter().enumerate().skip(theta + 1) {
            if let Some(shifted) = self.messages.get_mut(other) {
                shifted.set_arrival(Position::new(position.time, index));
            }
        }

        let placed = Position::new(position.time, theta);
        message.set_arrival(placed);
        self.messages.insert(id, message);
        placed
    }

    /// Appends `message` to the end of the slot at `time`.
    pub(crate) fn append(&mut self, message: Message, time: Time) -> Position {
        let theta = self.slot_len(time);
        self.insert_at(message, Position::new(time, theta))
    }

    /// Removes a message, closing the gap it leaves in its slot.
    pub(crate) fn remove(&mut self, id: MessageId) -> Option<Message> {
        let message = self.messages.remove(&id)?;
        let time = message.arrival().time;
        if let Some(slot) = self.slots.get_mut(&time) {
            slot.retain(|other| *other != id);
            for (index, other) in slot.iter().enumerate() {
                if let Some(shifted) = self.messages.get_mut(other) {
                    shifted.set_arrival(Position::new(time, index));
                }
            }
            if slot.is_empty() {
                self.slots.remove(&time);
            }
        }
        Some(message)
    }

    /// True when every slot holds thetas `0..n` matching the stored arrivals.
    pub fn is_dense(&self) -> bool {
        let indexed: usize = self.slots.values().map(Vec::len).sum();
        indexed == self.messages.len()
            && self.slots.iter().all(|(time, slot)| {
                !slot.is_empty()
                    && slot.iter().enumerate().all(|(theta, id)| {
                        self.messages
                            .get(id)
                            .is_some_and(|message| message.arrival() == Position::new(*time, theta))
                    })
            })
    }
}
