//! Error types for the simulator.

use crate::address::{Address, AddressError};
use crate::algorithm::AlgorithmError;
use crate::message::{MessageId, Position, Time};
use crate::topology::TopologyError;
use thiserror::Error;

/// Errors returned by [`Simulator`](crate::Simulator) operations.
///
/// Every failing operation leaves the simulator unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Invalid topology
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Malformed address
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Node \"{0}\" is not part of the topology")]
    UnknownNode(String),

    #[error("Algorithm \"{0}\" is not registered")]
    UnknownAlgorithm(String),

    #[error("Message {0} does not exist")]
    UnknownMessage(MessageId),

    #[error("Message {0} already exists")]
    DuplicateMessage(MessageId),

    #[error("No state for {0}")]
    UnknownState(Address),

    /// A non-self message was sent without an edge
    #[error("No edge from \"{from}\" to \"{to}\"")]
    NoRoute { from: String, to: String },

    /// A self-message targets another node
    #[error("Self-message from node \"{node}\" targets {target}")]
    InvalidSelfMessage { node: String, target: Address },

    /// The message was already delivered
    #[error("Message {id} was already delivered at {arrival}")]
    AlreadyDelivered { id: MessageId, arrival: Position },

    /// Target position is not after the current position
    #[error("Position {target} is not after the current position {current}")]
    InThePast { target: Position, current: Position },

    #[error("Position {target} is before the message's creation at {creation}")]
    BeforeCreation { target: Position, creation: Position },

    #[error("Position {target} is not after the parent's arrival at {parent}")]
    BeforeParent { target: Position, parent: Position },

    #[error("Theta {theta} is out of range for time {time} holding {len} messages")]
    ThetaOutOfRange { time: Time, theta: usize, len: usize },

    #[error("Parent message {0} does not exist")]
    UnknownParent(MessageId),

    #[error("Parent message {0} has not been delivered yet")]
    ParentPending(MessageId),

    /// Parent linkage does not match the creation point
    #[error("Creation {creation} does not match parent arrival {parent}")]
    ParentMismatch { creation: Position, parent: Position },

    /// A delay pushes the arrival past the end of the clock
    #[error("Delay {delay} from time {time} overflows the clock")]
    TimeOverflow { time: Time, delay: Time },

    /// An algorithm or hook failed; the step was not committed
    #[error("Algorithm failed at {address}: {source}")]
    Algorithm {
        address: Address,
        source: AlgorithmError,
    },
}

impl SimError {
    /// Creates a missing-edge error.
    pub fn no_route(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::NoRoute {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Arrival `delay` after `time`, or an overflow error.
    pub fn checked_arrival(time: Time, delay: Time) -> Result<Time, Self> {
        time.checked_add(delay)
            .ok_or(Self::TimeOverflow { time, delay })
    }

    /// Wraps an algorithm fault with the address it happened at.
    pub fn algorithm(address: &Address, source: AlgorithmError) -> Self {
        Self::Algorithm {
            address: address.clone(),
            source,
        }
    }

    /// True for the errors that protect causal order.
    pub fn is_causality_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyDelivered { .. }
                | Self::InThePast { .. }
                | Self::BeforeCreation { .. }
                | Self::BeforeParent { .. }
                | Self::ThetaOutOfRange { .. }
                | Self::ParentMismatch { .. }
                | Self::ParentPending(_)
        )
    }
}
