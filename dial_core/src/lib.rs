//! DIAL core: a deterministic, time-reversible discrete-event simulator for
//! distributed algorithms.
//!
//! Algorithms run as message handlers on the nodes of a [`Topology`]. The
//! [`Simulator`] delivers one message per step in `(time, theta)` order and
//! can undo any number of steps exactly.
//!
//! # Core Principle: Replayable Steps
//!
//! - **Time**: a logical clock; the queue slot index `theta` orders messages
//!   arriving at the same time
//! - **State**: every delivery appends a new state version instead of
//!   mutating the old one
//! - **Randomness**: all entropy derives from one 64-bit seed, and the
//!   generator is checkpointed after every step
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Simulator                            │
//! │  ┌───────────────────────────┐   ┌─────────────────────────┐   │
//! │  │ MessageQueue              │   │ StateStore              │   │
//! │  │ time -> [θ0, θ1, ...]     │   │ address -> [v0, v1 ...] │   │
//! │  └─────────────┬─────────────┘   └────────────▲────────────┘   │
//! │                │ next message                 │ new version    │
//! │           ┌────▼──────────────────────────────┴────┐           │
//! │           │ Algorithm + ConditionHooks (Context)   │           │
//! │           └────┬───────────────────────────────────┘           │
//! │                │ outbox                                        │
//! │           ┌────▼─────────────────────┐   ┌──────────────────┐  │
//! │           │ Topology edge Scheduler  │◄──│ DeterministicRng │  │
//! │           └──────────────────────────┘   └──────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use dial_core::{Address, Context, EdgeConfig, EdgeDirection, Message, Scheduler, Simulator, Topology};
//!
//! let mut topology = Topology::new();
//! topology.add_node("A").unwrap();
//! topology.add_node("B").unwrap();
//! topology
//!     .add_edge("A", "B", EdgeConfig::reliable(Scheduler::LocalFifo, EdgeDirection::Bidirectional))
//!     .unwrap();
//!
//! let start = Address::new("A", "hello", "main");
//! let mut sim = Simulator::builder(topology)
//!     .algorithm("hello", |ctx: &mut Context<'_>, message: &Message| {
//!         if ctx.address().node() == "A" {
//!             let target = ctx.address().with_node("B");
//!             ctx.send(message.copy_with(ctx.address().clone(), target));
//!         }
//!         Ok(())
//!     })
//!     .initial_message(0, Message::new(start.clone(), start))
//!     .build()
//!     .unwrap();
//!
//! let report = sim.step_forward_n(10).unwrap();
//! assert_eq!(report.steps, 2);
//! sim.step_backward_n(2);
//! assert_eq!(sim.position(), None);
//! ```

mod address;
mod algorithm;
mod color;
mod error;
mod message;
mod queue;
mod rng;
mod scheduler;
mod simulator;
mod state;
mod topology;

pub use address::{Address, AddressError};
pub use algorithm::{Algorithm, AlgorithmError, ConditionHook, Context, HookContext};
pub use color::{Color, ColorError};
pub use error::SimError;
pub use message::{Message, MessageId, MessagePatch, MessageSummary, Payload, Position, Time};
pub use queue::MessageQueue;
pub use rng::{DeterministicRng, RngCheckpoint};
pub use scheduler::{SchedulePolicy, ScheduleRequest, Scheduler};
pub use simulator::{
    Action, Phase, SimConfig, Simulator, SimulatorBuilder, Snapshot, StepDirection, StepReport,
};
pub use state::{State, StatePatch, StateStore, StateSummary};
pub use topology::{EdgeConfig, EdgeDirection, EdgeSummary, Topology, TopologyError, TopologySummary};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
