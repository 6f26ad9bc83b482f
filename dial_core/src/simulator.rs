//! The time-reversible simulator.
//!
//! A [`Simulator`] owns the message queue, the state histories and the
//! global generator. Stepping forward delivers the next message; stepping
//! backward undoes exactly one delivery. Both directions can be mixed
//! freely and a forward step after a backward step reproduces the undone
//! step bit for bit.

use crate::address::Address;
use crate::algorithm::{Algorithm, AlgorithmError, ConditionHook, Context, HookContext};
use crate::error::SimError;
use crate::message::{Message, MessageId, MessagePatch, MessageSummary, Position, Time};
use crate::queue::MessageQueue;
use crate::rng::{DeterministicRng, RngCheckpoint};
use crate::scheduler::ScheduleRequest;
use crate::state::{State, StatePatch, StateStore, StateSummary};
use crate::topology::{EdgeConfig, Topology};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Simulator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Seed of the global generator
    pub seed: u64,

    /// Width of the random arrival window of the built-in schedulers
    pub schedule_window: Time,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            schedule_window: 10,
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_schedule_window(mut self, window: Time) -> Self {
        self.schedule_window = window;
        self
    }
}

/// Direction of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    Forward,
    Backward,
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No message delivered yet
    NotStarted,

    /// At least one message delivered and more are pending
    Running,

    /// Nothing left after the current position. Inserting a message or
    /// stepping backward leaves this phase again.
    Exhausted,
}

/// Record of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub direction: StepDirection,

    /// Position of the delivered (or reverted) message
    pub position: Position,

    /// The delivered (or reverted) message
    pub message: MessageSummary,

    /// Messages produced by the delivery, or removed when reverting it
    pub produced: Vec<MessageSummary>,

    /// State of the target after the step, if it has one
    pub state: Option<StateSummary>,
}

/// Outcome of a multi-step operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Position after the last step
    pub position: Option<Position>,

    /// Number of steps taken
    pub steps: usize,

    pub actions: Vec<Action>,
}

impl StepReport {
    fn push(&mut self, action: Action, position: Option<Position>) {
        self.actions.push(action);
        self.steps += 1;
        self.position = position;
    }
}

/// Full mutable state of a simulator, used for reset and comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pointer: Option<Position>,
    queue: MessageQueue,
    states: StateStore,
    rng: RngCheckpoint,
    id_rng: RngCheckpoint,
    checkpoints: Vec<RngCheckpoint>,
}

impl Snapshot {
    pub fn pointer(&self) -> Option<Position> {
        self.pointer
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    pub fn rng(&self) -> &RngCheckpoint {
        &self.rng
    }

    pub fn checkpoints(&self) -> &[RngCheckpoint] {
        &self.checkpoints
    }
}

/// How an emitted message reaches its target.
enum Route {
    /// Self-message with its arrival time already computed
    At(Time),
    Edge(EdgeConfig),
}

/// Builder for [`Simulator`].
pub struct SimulatorBuilder {
    topology: Topology,
    config: SimConfig,
    algorithms: BTreeMap<String, Arc<dyn Algorithm>>,
    hooks: Vec<Arc<dyn ConditionHook>>,
    initial: Vec<(Time, Message)>,
}

impl SimulatorBuilder {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            config: SimConfig::default(),
            algorithms: BTreeMap::new(),
            hooks: Vec::new(),
            initial: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Registers a closure as the algorithm called `name`.
    pub fn algorithm<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Message) -> Result<(), AlgorithmError> + Send + Sync + 'static,
    {
        self.algorithm_with(name, Arc::new(handler))
    }

    /// Registers any [`Algorithm`] implementation under `name`.
    pub fn algorithm_with(mut self, name: impl Into<String>, algorithm: Arc<dyn Algorithm>) -> Self {
        self.algorithms.insert(name.into(), algorithm);
        self
    }

    /// Registers a closure as a condition hook.
    pub fn hook<F>(self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), AlgorithmError> + Send + Sync + 'static,
    {
        self.hook_with(Arc::new(hook))
    }

    pub fn hook_with(mut self, hook: Arc<dyn ConditionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Enqueues `message` at `time` when the simulator is built. Messages
    /// sharing a time keep the order they were added in.
    pub fn initial_message(mut self, time: Time, message: Message) -> Self {
        self.initial.push((time, message));
        self
    }

    /// Validates the setup and creates the simulator.
    pub fn build(self) -> Result<Simulator, SimError> {
        let mut simulator = Simulator {
            rng: DeterministicRng::seed_from_u64(self.config.seed),
            id_rng: DeterministicRng::seed_from_u64(self.config.seed.wrapping_mul(0x517cc1b727220a95)),
            topology: self.topology,
            config: self.config,
            algorithms: self.algorithms,
            hooks: self.hooks,
            pointer: None,
            queue: MessageQueue::new(),
            states: StateStore::new(),
            checkpoints: Vec::new(),
            initial: None,
        };

        for (time, message) in self.initial {
            simulator.enqueue_initial(message, time)?;
        }
        simulator.initial = Some(simulator.snapshot());

        info!(
            "Simulator ready: {} nodes, {} algorithms, {} initial messages (seed={})",
            simulator.topology.nodes().len(),
            simulator.algorithms.len(),
            simulator.queue.len(),
            simulator.config.seed
        );
        Ok(simulator)
    }
}

/// Deterministic, time-reversible discrete-event simulator.
pub struct Simulator {
    topology: Topology,
    config: SimConfig,
    algorithms: BTreeMap<String, Arc<dyn Algorithm>>,
    hooks: Vec<Arc<dyn ConditionHook>>,

    /// Last delivered position, `None` before the first step
    pointer: Option<Position>,
    queue: MessageQueue,
    states: StateStore,

    /// Global generator: state seeds, message ids, schedules, loss
    rng: DeterministicRng,

    /// Ids of messages injected through the control operations
    id_rng: DeterministicRng,

    /// Global generator after each forward step
    checkpoints: Vec<RngCheckpoint>,

    /// State right after construction
    initial: Option<Snapshot>,
}

impl Simulator {
    /// Starts building a simulator on `topology`.
    pub fn builder(topology: Topology) -> SimulatorBuilder {
        SimulatorBuilder::new(topology)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Last delivered position.
    pub fn position(&self) -> Option<Position> {
        self.pointer
    }

    /// Current simulation time (0 before the first step).
    pub fn time(&self) -> Time {
        self.pointer.map_or(0, |p| p.time)
    }

    pub fn phase(&self) -> Phase {
        match self.pointer {
            None => Phase::NotStarted,
            Some(_) if self.queue.next_after(self.pointer).is_none() => Phase::Exhausted,
            Some(_) => Phase::Running,
        }
    }

    /// Names of the registered algorithms.
    pub fn algorithms(&self) -> impl Iterator<Item = &str> + '_ {
        self.algorithms.keys().map(String::as_str)
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.queue.get(id)
    }

    /// All messages in delivery order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.queue.iter()
    }

    /// Messages arriving at `time`, in theta order.
    pub fn slot(&self, time: Time) -> impl Iterator<Item = &Message> + '_ {
        self.queue.slot(time).iter().filter_map(|id| self.queue.get(*id))
    }

    /// Messages not delivered yet.
    pub fn pending(&self) -> impl Iterator<Item = &Message> + '_ {
        let pointer = self.pointer;
        self.queue
            .iter()
            .filter(move |message| pointer.map_or(true, |p| message.arrival() > p))
    }

    /// Messages already delivered, in delivery order.
    pub fn consumed(&self) -> impl Iterator<Item = &Message> + '_ {
        let pointer = self.pointer;
        self.queue
            .iter()
            .filter(move |message| pointer.is_some_and(|p| message.arrival() <= p))
    }

    /// Current state of `address`.
    pub fn state(&self, address: &Address) -> Option<&State> {
        self.states.current(address)
    }

    /// All versions of `address`, oldest (untouched) first.
    pub fn state_history(&self, address: &Address) -> Option<&[State]> {
        self.states.history(address)
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    /// Addresses of the instances of `algorithm` that have a state.
    pub fn instances(&self, algorithm: &str) -> Vec<&Address> {
        self.states
            .addresses()
            .into_iter()
            .filter(|address| address.algorithm() == algorithm)
            .collect()
    }

    /// Walks parent links from `id` up to the message that started its
    /// chain.
    pub fn root_message(&self, id: MessageId) -> Option<&Message> {
        let mut message = self.queue.get(id)?;
        while let Some(parent) = message.parent().and_then(|parent| self.queue.get(parent)) {
            message = parent;
        }
        Some(message)
    }

    /// Global generator checkpoints, one per forward step taken.
    pub fn checkpoints(&self) -> &[RngCheckpoint] {
        &self.checkpoints
    }

    /// Captures the full mutable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pointer: self.pointer,
            queue: self.queue.clone(),
            states: self.states.clone(),
            rng: self.rng.checkpoint(),
            id_rng: self.id_rng.checkpoint(),
            checkpoints: self.checkpoints.clone(),
        }
    }

    /// The state captured right after construction.
    pub fn initial_snapshot(&self) -> Option<&Snapshot> {
        self.initial.as_ref()
    }

    /// Messages whose timing breaks causal order: arrival before creation,
    /// or creation different from the parent's arrival.
    pub fn causality_violations(&self) -> Vec<MessageId> {
        self.queue
            .iter()
            .filter(|message| {
                let parent_mismatch = message
                    .parent()
                    .and_then(|parent| self.queue.get(parent))
                    .is_some_and(|parent| parent.arrival() != message.creation());
                message.creation() > message.arrival() || parent_mismatch
            })
            .map(Message::id)
            .collect()
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Delivers the next message.
    ///
    /// Returns `Ok(None)` without side effects when nothing is left. On
    /// error nothing is committed.
    pub fn step_forward(&mut self) -> Result<Option<Action>, SimError> {
        let Some(position) = self.queue.next_after(self.pointer) else {
            return Ok(None);
        };
        let Some(message) = self.queue.at(position).cloned() else {
            return Ok(None);
        };

        let mut rng = self.rng.clone();
        let mut outbox = Vec::new();
        let mut routes = Vec::new();
        let mut next_state = None;

        if !message.is_lost() {
            let address = message.target().clone();
            let algorithm = self.algorithm_for(&address)?;

            let (initial, mut state) = match self.states.current(&address) {
                Some(current) => (None, current.clone()),
                None => {
                    let neighbors = self.topology.neighbors(address.node());
                    let fresh = State::new(address.clone(), neighbors, rng.draw_seed());
                    (Some(fresh.clone()), fresh)
                }
            };

            let mut ctx = Context::new(&mut state, position, &mut outbox, &self.states);
            algorithm
                .on_message(&mut ctx, &message)
                .map_err(|err| SimError::algorithm(&address, err))?;

            for hook in &self.hooks {
                let mut ctx = HookContext::new(&state, &message, position, &mut outbox, &self.states);
                hook.after_delivery(&mut ctx)
                    .map_err(|err| SimError::algorithm(&address, err))?;
            }

            for sent in &outbox {
                routes.push(self.route(&address, sent, position.time)?);
            }
            next_state = Some((initial, state));
        }

        // Everything fallible is done, commit.
        let mut produced = Vec::with_capacity(outbox.len());
        for (mut child, route) in outbox.into_iter().zip(routes) {
            let id = fresh_id(&self.queue, &mut rng);
            child.set_id(id);
            child.set_parent(Some(message.id()));
            child.set_creation(position);

            let time = match route {
                Route::At(time) => time,
                Route::Edge(config) => {
                    let request = ScheduleRequest {
                        topology: &self.topology,
                        now: position,
                        queue: &self.queue,
                        message: &child,
                        window: self.config.schedule_window,
                    };
                    let time = config.scheduler.arrival_time(&request, &mut rng);
                    child.set_lost(rng.draw_unit() >= config.reliability);
                    time
                }
            };

            self.queue.append(child, time);
            if let Some(parent) = self.queue.get_mut(message.id()) {
                parent.push_child(id);
            }
            produced.push(id);
        }

        let state = next_state.map(|(initial, state)| {
            let summary = state.summary();
            self.states.commit(initial, state);
            summary
        });

        self.pointer = Some(position);
        self.rng = rng;
        self.checkpoints.push(self.rng.checkpoint());

        debug!(
            "Step forward {} -> {}: {} produced{}",
            position,
            message.target(),
            produced.len(),
            if message.is_lost() { " (lost)" } else { "" }
        );

        Ok(Some(Action {
            direction: StepDirection::Forward,
            position,
            message: self
                .queue
                .get(message.id())
                .map_or_else(|| message.summary(), Message::summary),
            produced: produced
                .into_iter()
                .filter_map(|id| self.queue.get(id))
                .map(Message::summary)
                .collect(),
            state,
        }))
    }

    /// Undoes the last delivery. Returns `None` before the first step.
    pub fn step_backward(&mut self) -> Option<Action> {
        let position = self.pointer?;
        let id = self.queue.at(position)?.id();

        let children = self.queue.get_mut(id).map(Message::take_children).unwrap_or_default();
        let removed: Vec<MessageSummary> = children
            .into_iter()
            .filter_map(|child| self.queue.remove(child))
            .map(|child| child.summary())
            .collect();

        let message = self.queue.get(id)?.summary();
        let state = if message.is_lost {
            None
        } else {
            self.states.pop(&message.target);
            self.states.current(&message.target).map(State::summary)
        };

        self.checkpoints.pop();
        let checkpoint = match self.checkpoints.last() {
            Some(checkpoint) => *checkpoint,
            None => self.initial_rng(),
        };
        self.rng = DeterministicRng::restore(&checkpoint);
        self.pointer = self.queue.prev_before(position);

        debug!(
            "Step backward {} -> {}: {} removed",
            position,
            message.target,
            removed.len()
        );

        Some(Action {
            direction: StepDirection::Backward,
            position,
            message,
            produced: removed,
            state,
        })
    }

    /// Takes up to `n` forward steps, stopping early when nothing is left.
    pub fn step_forward_n(&mut self, n: usize) -> Result<StepReport, SimError> {
        let mut report = StepReport {
            position: self.pointer,
            ..StepReport::default()
        };
        for _ in 0..n {
            match self.step_forward()? {
                Some(action) => report.push(action, self.pointer),
                None => break,
            }
        }
        Ok(report)
    }

    /// Takes up to `n` backward steps, stopping early at the start.
    pub fn step_backward_n(&mut self, n: usize) -> StepReport {
        let mut report = StepReport {
            position: self.pointer,
            ..StepReport::default()
        };
        for _ in 0..n {
            match self.step_backward() {
                Some(action) => report.push(action, self.pointer),
                None => break,
            }
        }
        report
    }

    /// Steps forward until the current time has advanced by at least
    /// `delta`. Before the first step, the first delivery sets the time
    /// the distance is measured from.
    pub fn time_forward(&mut self, delta: Time) -> Result<StepReport, SimError> {
        let mut report = StepReport {
            position: self.pointer,
            ..StepReport::default()
        };
        if self.pointer.is_none() {
            match self.step_forward()? {
                Some(action) => report.push(action, self.pointer),
                None => return Ok(report),
            }
        }

        let target = self.time().saturating_add(delta);
        while self.time() < target {
            match self.step_forward()? {
                Some(action) => report.push(action, self.pointer),
                None => break,
            }
        }
        Ok(report)
    }

    /// Steps backward until the current time is `delta` earlier, or the
    /// start is reached.
    pub fn time_backward(&mut self, delta: Time) -> StepReport {
        let mut report = StepReport {
            position: self.pointer,
            ..StepReport::default()
        };
        let Some(current) = self.pointer else {
            return report;
        };

        let floor = current.time.checked_sub(delta);
        while let Some(position) = self.pointer {
            if floor.is_some_and(|floor| position.time <= floor) {
                break;
            }
            match self.step_backward() {
                Some(action) => report.push(action, self.pointer),
                None => break,
            }
        }
        report
    }

    /// Restores the state right after construction.
    pub fn reset(&mut self) {
        if let Some(initial) = self.initial.clone() {
            self.pointer = initial.pointer;
            self.queue = initial.queue;
            self.states = initial.states;
            self.rng = DeterministicRng::restore(&initial.rng);
            self.id_rng = DeterministicRng::restore(&initial.id_rng);
            self.checkpoints = initial.checkpoints;
        }
        info!("Simulator reset ({} messages queued)", self.queue.len());
    }

    // ========================================================================
    // Control operations
    // ========================================================================

    /// Appends `message` to the slot at `time`.
    pub fn insert_message(&mut self, message: Message, time: Time) -> Result<MessageId, SimError> {
        let theta = self.queue.slot_len(time);
        self.insert_message_at(message, Position::new(time, theta))
    }

    /// Inserts `message` at `position`, shifting later messages of the slot.
    ///
    /// A message without an id gets a fresh one. A message with a parent
    /// must have been created at the parent's arrival, and the parent must
    /// already be delivered.
    pub fn insert_message_at(&mut self, mut message: Message, position: Position) -> Result<MessageId, SimError> {
        self.check_addresses(&message)?;
        self.check_after_pointer(position)?;

        let len = self.queue.slot_len(position.time);
        if position.theta > len {
            return Err(SimError::ThetaOutOfRange {
                time: position.time,
                theta: position.theta,
                len,
            });
        }
        if message.creation() > position {
            return Err(SimError::BeforeCreation {
                target: position,
                creation: message.creation(),
            });
        }
        if let Some(parent) = message.parent() {
            let arrival = self
                .queue
                .get(parent)
                .map(Message::arrival)
                .ok_or(SimError::UnknownParent(parent))?;
            if !self.is_delivered(arrival) {
                return Err(SimError::ParentPending(parent));
            }
            if arrival != message.creation() {
                return Err(SimError::ParentMismatch {
                    creation: message.creation(),
                    parent: arrival,
                });
            }
        }

        let id = if message.id().is_nil() {
            fresh_id(&self.queue, &mut self.id_rng)
        } else if self.queue.contains(message.id()) {
            return Err(SimError::DuplicateMessage(message.id()));
        } else {
            message.id()
        };
        message.set_id(id);

        let parent = message.parent();
        let placed = self.queue.insert_at(message, position);
        if let Some(parent) = parent.and_then(|parent| self.queue.get_mut(parent)) {
            parent.push_child(id);
        }
        debug!("Inserted message {} at {}", id, placed);
        Ok(id)
    }

    /// Schedules `message` `delay` time units after the current time,
    /// bypassing edges. Source and target must be on the same node.
    pub fn insert_self_message(&mut self, mut message: Message, delay: Time) -> Result<MessageId, SimError> {
        if message.source().node() != message.target().node() {
            return Err(SimError::InvalidSelfMessage {
                node: message.source().node().to_string(),
                target: message.target().clone(),
            });
        }
        let time = SimError::checked_arrival(self.time(), delay)?;
        message.mark_self_message(delay);
        message.set_creation(self.pointer.unwrap_or(Position::ORIGIN));
        self.insert_message(message, time)
    }

    /// Moves a pending message to `(time, theta)`.
    ///
    /// `theta` may be at most the number of messages currently at `time`.
    /// On error the queue is unchanged.
    pub fn reschedule(&mut self, id: MessageId, time: Time, theta: usize) -> Result<Position, SimError> {
        let message = self.pending_message(id)?;
        let target = Position::new(time, theta);
        self.check_after_pointer(target)?;

        if target <= message.creation() {
            return Err(SimError::BeforeCreation {
                target,
                creation: message.creation(),
            });
        }
        if let Some(parent) = message.parent().and_then(|parent| self.queue.get(parent)) {
            if target <= parent.arrival() {
                return Err(SimError::BeforeParent {
                    target,
                    parent: parent.arrival(),
                });
            }
        }
        let len = self.queue.slot_len(time);
        if theta > len {
            return Err(SimError::ThetaOutOfRange { time, theta, len });
        }

        let Some(message) = self.queue.remove(id) else {
            return Err(SimError::UnknownMessage(id));
        };
        let placed = self.queue.insert_at(message, target);
        debug!("Rescheduled message {} to {}", id, placed);
        Ok(placed)
    }

    /// Removes a pending message and unlinks it from its parent.
    pub fn delete_message(&mut self, id: MessageId) -> Result<MessageSummary, SimError> {
        self.pending_message(id)?;
        let Some(message) = self.queue.remove(id) else {
            return Err(SimError::UnknownMessage(id));
        };
        if let Some(parent) = message.parent().and_then(|parent| self.queue.get_mut(parent)) {
            parent.remove_child(id);
        }
        debug!("Deleted message {}", id);
        Ok(message.summary())
    }

    /// Edits the content of a pending message.
    pub fn modify_message(&mut self, id: MessageId, patch: MessagePatch) -> Result<MessageSummary, SimError> {
        let message = self.pending_message(id)?;
        let source = patch.source.as_ref().unwrap_or(message.source());
        let target = patch.target.as_ref().unwrap_or(message.target());
        source.validate()?;
        target.validate()?;
        self.check_target(target)?;
        if message.is_self_message() && source.node() != target.node() {
            return Err(SimError::InvalidSelfMessage {
                node: source.node().to_string(),
                target: target.clone(),
            });
        }

        let Some(message) = self.queue.get_mut(id) else {
            return Err(SimError::UnknownMessage(id));
        };
        message.apply(patch);
        Ok(message.summary())
    }

    /// Edits the current version of a state in place.
    pub fn modify_state(&mut self, address: &Address, patch: StatePatch) -> Result<StateSummary, SimError> {
        let state = self
            .states
            .current_mut(address)
            .ok_or_else(|| SimError::UnknownState(address.clone()))?;
        state.apply(patch);
        Ok(state.summary())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn enqueue_initial(&mut self, mut message: Message, time: Time) -> Result<(), SimError> {
        self.check_addresses(&message)?;
        let position = Position::new(time, self.queue.slot_len(time));
        if message.creation() > position {
            return Err(SimError::BeforeCreation {
                target: position,
                creation: message.creation(),
            });
        }

        let id = if message.id().is_nil() {
            fresh_id(&self.queue, &mut self.rng)
        } else if self.queue.contains(message.id()) {
            return Err(SimError::DuplicateMessage(message.id()));
        } else {
            message.id()
        };
        message.set_id(id);
        message.set_parent(None);
        self.queue.append(message, time);
        Ok(())
    }

    fn algorithm_for(&self, address: &Address) -> Result<Arc<dyn Algorithm>, SimError> {
        self.algorithms
            .get(address.algorithm())
            .cloned()
            .ok_or_else(|| SimError::UnknownAlgorithm(address.algorithm().to_string()))
    }

    fn check_target(&self, target: &Address) -> Result<(), SimError> {
        if !self.topology.has_node(target.node()) {
            return Err(SimError::UnknownNode(target.node().to_string()));
        }
        self.algorithm_for(target).map(|_| ())
    }

    /// Both addresses must round-trip through their string form and the
    /// target must be reachable.
    fn check_addresses(&self, message: &Message) -> Result<(), SimError> {
        message.source().validate()?;
        message.target().validate()?;
        self.check_target(message.target())
    }

    fn check_after_pointer(&self, target: Position) -> Result<(), SimError> {
        match self.pointer {
            Some(current) if target <= current => Err(SimError::InThePast { target, current }),
            _ => Ok(()),
        }
    }

    fn is_delivered(&self, position: Position) -> bool {
        self.pointer.is_some_and(|pointer| position <= pointer)
    }

    fn pending_message(&self, id: MessageId) -> Result<&Message, SimError> {
        let message = self.queue.get(id).ok_or(SimError::UnknownMessage(id))?;
        if self.is_delivered(message.arrival()) {
            return Err(SimError::AlreadyDelivered {
                id,
                arrival: message.arrival(),
            });
        }
        Ok(message)
    }

    /// Decides how a message emitted at `sender` at time `now` travels.
    fn route(&self, sender: &Address, message: &Message, now: Time) -> Result<Route, SimError> {
        self.check_addresses(message)?;
        if message.is_self_message() {
            if message.target().node() != sender.node() {
                return Err(SimError::InvalidSelfMessage {
                    node: sender.node().to_string(),
                    target: message.target().clone(),
                });
            }
            let delay = message.self_message_delay().unwrap_or(0);
            return SimError::checked_arrival(now, delay).map(Route::At);
        }

        let (from, to) = (message.source().node(), message.target().node());
        self.topology
            .edge_config(from, to)
            .cloned()
            .map(Route::Edge)
            .ok_or_else(|| SimError::no_route(from, to))
    }

    fn initial_rng(&self) -> RngCheckpoint {
        match &self.initial {
            Some(initial) => initial.rng,
            None => DeterministicRng::seed_from_u64(self.config.seed).checkpoint(),
        }
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("algorithms", &self.algorithms.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.len())
            .field("pointer", &self.pointer)
            .field("messages", &self.queue.len())
            .field("states", &self.states.len())
            .finish()
    }
}

/// Draws ids until one is not in use.
fn fresh_id(queue: &MessageQueue, rng: &mut DeterministicRng) -> MessageId {
    loop {
        let id = MessageId(rng.draw_uuid());
        if !queue.contains(id) {
            return id;
        }
    }
}
