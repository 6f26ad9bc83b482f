//! Edge schedulers: compute when a sent message arrives.
//!
//! A scheduler only looks at the request and draws from the generator it
//! is handed, so replaying a step with a restored generator yields the
//! same arrival times.

use crate::message::{Message, Position, Time};
use crate::queue::MessageQueue;
use crate::rng::DeterministicRng;
use crate::topology::Topology;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Everything a scheduler may inspect when placing a message.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleRequest<'a> {
    pub topology: &'a Topology,

    /// Position of the message being delivered
    pub now: Position,

    /// Queue, including messages already placed in the current step
    pub queue: &'a MessageQueue,

    /// The message to place
    pub message: &'a Message,

    /// Width of the random window, at least 1
    pub window: Time,
}

/// A user-supplied scheduling policy.
pub trait SchedulePolicy: Send + Sync + fmt::Debug {
    /// Short name used in summaries and logs.
    fn name(&self) -> &str;

    /// Returns the arrival time for `request.message`.
    fn schedule(&self, request: &ScheduleRequest<'_>, rng: &mut DeterministicRng) -> Time;
}

/// Built-in scheduling policies.
#[derive(Debug, Clone)]
pub enum Scheduler {
    /// Random delay that never overtakes earlier traffic on the same link
    LocalFifo,

    /// Always after everything already queued
    GlobalFifo,

    /// Uniform random delay
    Random,

    /// User policy
    Custom(Arc<dyn SchedulePolicy>),
}

impl Scheduler {
    /// Wraps a user policy.
    pub fn custom(policy: impl SchedulePolicy + 'static) -> Self {
        Self::Custom(Arc::new(policy))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::LocalFifo => "local_fifo",
            Self::GlobalFifo => "global_fifo",
            Self::Random => "random",
            Self::Custom(policy) => policy.name(),
        }
    }

    /// Computes the arrival time, clamped to be strictly after `request.now`.
    /// Windows that run past the end of the clock are cut at `Time::MAX`.
    pub fn arrival_time(&self, request: &ScheduleRequest<'_>, rng: &mut DeterministicRng) -> Time {
        let request = ScheduleRequest {
            window: request.window.max(1),
            ..*request
        };
        let earliest = request.now.time.saturating_add(1);

        let time = match self {
            Self::LocalFifo => local_fifo(&request, rng),
            Self::GlobalFifo => global_fifo(&request),
            Self::Random => rng.draw_range(earliest, earliest.saturating_add(request.window)),
            Self::Custom(policy) => policy.schedule(&request, rng),
        };

        if time < earliest {
            warn!(
                "Scheduler {} returned t={} before t={}, clamping",
                self.name(),
                time,
                earliest
            );
            return earliest;
        }
        trace!("{} scheduled {} at t={}", self.name(), request.message.id(), time);
        time
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn local_fifo(request: &ScheduleRequest<'_>, rng: &mut DeterministicRng) -> Time {
    let source = request.message.source().node();
    let target = request.message.target().node();

    let min = request
        .queue
        .iter_after(request.now)
        .filter(|queued| queued.source().node() == source && queued.target().node() == target)
        .map(|queued| queued.arrival().time.saturating_add(1))
        .fold(request.now.time.saturating_add(1), Time::max);

    rng.draw_range(min, min.saturating_add(request.window))
}

fn global_fifo(request: &ScheduleRequest<'_>) -> Time {
    match request.queue.max_time() {
        Some(max) => max.saturating_add(1),
        None => request.now.time.saturating_add(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::message::MessageId;
    use crate::topology::{EdgeConfig, EdgeDirection};
    use uuid::Uuid;

    fn topology() -> Topology {
        let mut topology = Topology::new();
        topology.add_node("A").unwrap();
        topology.add_node("B").unwrap();
        topology
            .add_edge("A", "B", EdgeConfig::reliable(Scheduler::LocalFifo, EdgeDirection::Bidirectional))
            .unwrap();
        topology
    }

    fn message(from: &str, to: &str, n: u128) -> Message {
        Message::new(Address::new(from, "x", "main"), Address::new(to, "x", "main"))
            .with_id(MessageId(Uuid::from_u128(n)))
    }

    #[derive(Debug)]
    struct Fixed(Time);

    impl SchedulePolicy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn schedule(&self, _request: &ScheduleRequest<'_>, _rng: &mut DeterministicRng) -> Time {
            self.0
        }
    }

    #[test]
    fn test_local_fifo_never_overtakes() {
        let topology = topology();
        let mut queue = MessageQueue::new();
        queue.append(message("A", "B", 1), 1);
        queue.append(message("A", "B", 2), 30);
        queue.append(message("B", "A", 3), 80);

        let sent = message("A", "B", 4);
        let request = ScheduleRequest {
            topology: &topology,
            now: Position::new(1, 0),
            queue: &queue,
            message: &sent,
            window: 10,
        };

        let mut rng = DeterministicRng::seed_from_u64(5);
        for _ in 0..50 {
            let time = Scheduler::LocalFifo.arrival_time(&request, &mut rng);
            assert!((31..41).contains(&time), "got {time}");
        }
    }

    #[test]
    fn test_global_fifo_goes_last() {
        let topology = topology();
        let mut queue = MessageQueue::new();
        let sent = message("A", "B", 9);
        let mut rng = DeterministicRng::seed_from_u64(5);
        let now = Position::new(4, 0);

        let request = ScheduleRequest { topology: &topology, now, queue: &queue, message: &sent, window: 10 };
        assert_eq!(Scheduler::GlobalFifo.arrival_time(&request, &mut rng), 5);

        queue.append(message("B", "A", 1), 17);
        let request = ScheduleRequest { topology: &topology, now, queue: &queue, message: &sent, window: 10 };
        assert_eq!(Scheduler::GlobalFifo.arrival_time(&request, &mut rng), 18);
    }

    #[test]
    fn test_random_window_and_zero_width() {
        let topology = topology();
        let queue = MessageQueue::new();
        let sent = message("A", "B", 9);
        let mut request = ScheduleRequest {
            topology: &topology,
            now: Position::new(10, 0),
            queue: &queue,
            message: &sent,
            window: 10,
        };
        let mut rng = DeterministicRng::seed_from_u64(8);
        for _ in 0..50 {
            let time = Scheduler::Random.arrival_time(&request, &mut rng);
            assert!((11..=20).contains(&time));
        }

        request.window = 0;
        assert_eq!(Scheduler::Random.arrival_time(&request, &mut rng), 11);
    }

    #[test]
    fn test_huge_window_is_cut_at_end_of_clock() {
        let topology = topology();
        let mut queue = MessageQueue::new();
        let sent = message("A", "B", 9);
        let request = ScheduleRequest {
            topology: &topology,
            now: Position::new(10, 0),
            queue: &queue,
            message: &sent,
            window: Time::MAX,
        };
        let mut rng = DeterministicRng::seed_from_u64(8);
        for scheduler in [Scheduler::Random, Scheduler::LocalFifo] {
            assert!(scheduler.arrival_time(&request, &mut rng) >= 11);
        }

        queue.append(message("B", "A", 1), Time::MAX);
        let request = ScheduleRequest { topology: &topology, now: Position::new(10, 0), queue: &queue, message: &sent, window: Time::MAX };
        assert_eq!(Scheduler::GlobalFifo.arrival_time(&request, &mut rng), Time::MAX);
    }

    #[test]
    fn test_custom_result_is_clamped() {
        let topology = topology();
        let queue = MessageQueue::new();
        let sent = message("A", "B", 9);
        let request = ScheduleRequest {
            topology: &topology,
            now: Position::new(10, 3),
            queue: &queue,
            message: &sent,
            window: 10,
        };
        let mut rng = DeterministicRng::seed_from_u64(8);

        assert_eq!(Scheduler::custom(Fixed(2)).arrival_time(&request, &mut rng), 11);
        assert_eq!(Scheduler::custom(Fixed(15)).arrival_time(&request, &mut rng), 15);
        assert_eq!(Scheduler::custom(Fixed(0)).name(), "fixed");
    }

    #[test]
    fn test_same_generator_same_result() {
        let topology = topology();
        let queue = MessageQueue::new();
        let sent = message("A", "B", 9);
        let request = ScheduleRequest {
            topology: &topology,
            now: Position::new(0, 0),
            queue: &queue,
            message: &sent,
            window: 10,
        };
        let mut a = DeterministicRng::seed_from_u64(77);
        let mut b = a.clone();
        assert_eq!(
            Scheduler::Random.arrival_time(&request, &mut a),
            Scheduler::Random.arrival_time(&request, &mut b)
        );
    }
}
