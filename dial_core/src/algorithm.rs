//! The contract between the simulator and user algorithms.
//!
//! An algorithm is invoked once per delivered message with a [`Context`]
//! holding a private copy of the target's state and an outbox. Nothing it
//! does touches the simulator until the whole step has succeeded.

use crate::address::{Address, AddressError};
use crate::message::{Message, Position, Time};
use crate::state::{State, StateStore};
use thiserror::Error;

/// Fault raised by an algorithm or hook. Aborts the step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AlgorithmError(pub String);

impl AlgorithmError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// The message lacks a payload field the algorithm needs.
    pub fn missing_field(key: &str) -> Self {
        Self(format!("Missing message field \"{key}\""))
    }
}

impl From<AddressError> for AlgorithmError {
    fn from(err: AddressError) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_json::Error> for AlgorithmError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Message handler registered under an algorithm name.
pub trait Algorithm: Send + Sync {
    fn on_message(&self, ctx: &mut Context<'_>, message: &Message) -> Result<(), AlgorithmError>;
}

impl<F> Algorithm for F
where
    F: Fn(&mut Context<'_>, &Message) -> Result<(), AlgorithmError> + Send + Sync,
{
    fn on_message(&self, ctx: &mut Context<'_>, message: &Message) -> Result<(), AlgorithmError> {
        self(ctx, message)
    }
}

/// Runs after every non-lost delivery, in registration order.
pub trait ConditionHook: Send + Sync {
    fn after_delivery(&self, ctx: &mut HookContext<'_>) -> Result<(), AlgorithmError>;
}

impl<F> ConditionHook for F
where
    F: Fn(&mut HookContext<'_>) -> Result<(), AlgorithmError> + Send + Sync,
{
    fn after_delivery(&self, ctx: &mut HookContext<'_>) -> Result<(), AlgorithmError> {
        self(ctx)
    }
}

/// Capabilities handed to an algorithm for one delivery.
pub struct Context<'a> {
    state: &'a mut State,
    position: Position,
    outbox: &'a mut Vec<Message>,
    peers: &'a StateStore,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        state: &'a mut State,
        position: Position,
        outbox: &'a mut Vec<Message>,
        peers: &'a StateStore,
    ) -> Self {
        Self {
            state,
            position,
            outbox,
            peers,
        }
    }

    /// The working copy of the target's state.
    pub fn state(&self) -> &State {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        self.state
    }

    /// Address of the instance being invoked.
    pub fn address(&self) -> &Address {
        self.state.address()
    }

    /// Current simulation time.
    pub fn time(&self) -> Time {
        self.position.time
    }

    /// Position of the message being delivered.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Queues `message` for delivery over the edge to its target.
    pub fn send(&mut self, message: Message) {
        self.outbox.push(message);
    }

    /// Queues `message` for delivery `delay` time units from now, bypassing
    /// edges. The target must live on this node.
    pub fn send_to_self(&mut self, mut message: Message, delay: Time) {
        message.mark_self_message(delay);
        self.outbox.push(message);
    }

    /// Current state of another address, as of before this step.
    pub fn peer_state(&self, address: &Address) -> Option<&State> {
        self.peers.current(address)
    }

    /// Messages sent so far in this step.
    pub fn emitted(&self) -> &[Message] {
        self.outbox
    }
}

/// Capabilities handed to a condition hook after a delivery.
pub struct HookContext<'a> {
    state: &'a State,
    message: &'a Message,
    position: Position,
    outbox: &'a mut Vec<Message>,
    peers: &'a StateStore,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        state: &'a State,
        message: &'a Message,
        position: Position,
        outbox: &'a mut Vec<Message>,
        peers: &'a StateStore,
    ) -> Self {
        Self {
            state,
            message,
            position,
            outbox,
            peers,
        }
    }

    /// The state as the algorithm left it.
    pub fn state(&self) -> &State {
        self.state
    }

    /// The delivered message.
    pub fn message(&self) -> &Message {
        self.message
    }

    pub fn address(&self) -> &Address {
        self.state.address()
    }

    pub fn time(&self) -> Time {
        self.position.time
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn send(&mut self, message: Message) {
        self.outbox.push(message);
    }

    pub fn send_to_self(&mut self, mut message: Message, delay: Time) {
        message.mark_self_message(delay);
        self.outbox.push(message);
    }

    pub fn peer_state(&self, address: &Address) -> Option<&State> {
        self.peers.current(address)
    }

    /// Messages emitted by the algorithm and earlier hooks in this step.
    pub fn emitted(&self) -> &[Message] {
        self.outbox
    }
}
