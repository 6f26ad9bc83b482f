//! Per-address algorithm state and its version history.

use crate::address::Address;
use crate::color::Color;
use crate::message::Payload;
use crate::rng::DeterministicRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The data an algorithm instance operates on.
///
/// Each delivery works on a copy of the previous version, so older
/// versions in the history stay untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    address: Address,

    /// Color shown for this instance
    pub color: Color,

    /// Names of the nodes reachable over an outgoing edge
    pub neighbors: Vec<String>,

    /// Free-form algorithm data
    pub data: Payload,

    /// Private generator, seeded once from the simulator's generator
    rng: DeterministicRng,
}

impl State {
    /// Creates the initial, untouched version of a state.
    pub fn new(address: Address, neighbors: Vec<String>, seed: u64) -> Self {
        Self {
            address,
            color: Color::default(),
            neighbors,
            data: Payload::new(),
            rng: DeterministicRng::seed_from_u64(seed),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn update_color(&mut self, color: Color) {
        self.color = color;
    }

    /// The instance's own deterministic generator.
    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    /// Neighbors other than the node this state lives on.
    pub fn peers(&self) -> impl Iterator<Item = &str> + '_ {
        self.neighbors
            .iter()
            .map(String::as_str)
            .filter(move |node| *node != self.address.node())
    }

    /// Serializable view of this state.
    pub fn summary(&self) -> StateSummary {
        StateSummary {
            address: self.address.clone(),
            color: self.color,
            neighbors: self.neighbors.clone(),
            data: self.data.clone(),
        }
    }

    pub(crate) fn apply(&mut self, patch: StatePatch) {
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(neighbors) = patch.neighbors {
            self.neighbors = neighbors;
        }
        if let Some(data) = patch.data {
            self.data = data;
        }
    }
}

/// Serializable summary of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub address: Address,
    pub color: Color,
    pub neighbors: Vec<String>,
    pub data: Payload,
}

/// Edit of a state's current version. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatePatch {
    pub color: Option<Color>,
    pub neighbors: Option<Vec<String>>,
    pub data: Option<Payload>,
}

/// Version histories of all touched addresses.
///
/// Version 0 of a history is the untouched initial state; the last entry
/// is the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    histories: HashMap<Address, Vec<State>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses with a history.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Current version for `address`.
    pub fn current(&self, address: &Address) -> Option<&State> {
        self.histories.get(address).and_then(|history| history.last())
    }

    pub(crate) fn current_mut(&mut self, address: &Address) -> Option<&mut State> {
        self.histories.get_mut(address).and_then(|history| history.last_mut())
    }

    /// All versions for `address`, oldest first.
    pub fn history(&self, address: &Address) -> Option<&[State]> {
        self.histories.get(address).map(Vec::as_slice)
    }

    /// Addresses with a history, sorted.
    pub fn addresses(&self) -> Vec<&Address> {
        let mut addresses: Vec<&Address> = self.histories.keys().collect();
        addresses.sort();
        addresses
    }

    /// Current versions of all states, sorted by address.
    pub fn iter_current(&self) -> impl Iterator<Item = &State> + '_ {
        self.addresses()
            .into_iter()
            .filter_map(|address| self.current(address))
    }

    /// Appends `next` to the history of its address. `initial` is the
    /// untouched version 0 when the address has no history yet.
    pub(crate) fn commit(&mut self, initial: Option<State>, next: State) {
        let history = self.histories.entry(next.address().clone()).or_default();
        if history.is_empty() {
            history.extend(initial);
        }
        history.push(next);
    }

    /// Removes the current version. A history that falls back to only its
    /// untouched version is dropped.
    pub(crate) fn pop(&mut self, address: &Address) -> Option<State> {
        let history = self.histories.get_mut(address)?;
        let popped = history.pop();
        if history.len() <= 1 {
            self.histories.remove(address);
        }
        popped
    }
}
