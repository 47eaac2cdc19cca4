//! Fuzz target for the connection state machine
//!
//! Drives a `ConnectionManager` with arbitrary sequences of lifecycle calls,
//! transport events (live and stale) and timer expirations.
//!
//! # Invariants
//!
//! - NEVER panic
//! - `attempt` never exceeds the configured maximum
//! - A live transport exists exactly in `Connecting` and `Connected`
//! - A timer is pending exactly in `Reconnecting`
//! - `Connected` always has attempt 0

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tidings_core::{
    ClientConfig, ConnectionAction, ConnectionManager, ConnectionPhase, Generation, TimerId,
    TransportError, TransportEvent,
};

#[derive(Debug, Arbitrary)]
enum Op {
    Start,
    Stop,
    ForceReconnect,
    Opened { stale: bool },
    Closed { stale: bool },
    Failed { stale: bool },
    Frame { stale: bool, text: String },
    Timer { stale: bool },
    Send,
}

#[derive(Debug, Arbitrary)]
struct Input {
    auto_reconnect: bool,
    max_attempts: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let max = u32::from(input.max_attempts % 8);
    let config = ClientConfig::new("ws://localhost:3001/ws", "fuzz")
        .with_auto_reconnect(input.auto_reconnect)
        .with_reconnect_interval(Duration::from_millis(10))
        .with_max_reconnect_attempts(max);
    let mut manager = ConnectionManager::new(&config).expect("config is valid");

    // Generations and timers the manager has handed out
    let mut generations: Vec<Generation> = Vec::new();
    let mut timers: Vec<TimerId> = Vec::new();

    for op in input.ops {
        let live = manager.live_generation();
        let oldest = generations.first().copied();
        let pick_generation = |stale: bool| if stale { oldest } else { live };

        let actions = match op {
            Op::Start => manager.start().unwrap_or_default(),
            Op::Stop => manager.stop(),
            Op::ForceReconnect => manager.force_reconnect(),
            Op::Opened { stale } => match pick_generation(stale) {
                Some(g) => manager.handle_transport(g, TransportEvent::Opened),
                None => Vec::new(),
            },
            Op::Closed { stale } => match pick_generation(stale) {
                Some(g) => manager.handle_transport(g, TransportEvent::Closed { reason: None }),
                None => Vec::new(),
            },
            Op::Failed { stale } => match pick_generation(stale) {
                Some(g) => manager.handle_transport(
                    g,
                    TransportEvent::Failed(TransportError::Io("fuzz".into())),
                ),
                None => Vec::new(),
            },
            Op::Frame { stale, text } => match pick_generation(stale) {
                Some(g) => manager.handle_transport(g, TransportEvent::Frame(text)),
                None => Vec::new(),
            },
            Op::Timer { stale } => {
                let timer = if stale { timers.first().copied() } else { manager.pending_timer() };
                timer.map(|t| manager.handle_timer(t)).unwrap_or_default()
            },
            Op::Send => manager
                .send(&tidings_proto::OutboundCommand::Init { user_id: "fuzz".into() })
                .unwrap_or_default(),
        };

        for action in &actions {
            match action {
                ConnectionAction::Open { generation, .. } => generations.push(*generation),
                ConnectionAction::ScheduleTimer { timer, .. } => timers.push(*timer),
                _ => {},
            }
        }

        let state = manager.state();
        assert!(state.attempt <= max, "attempt {} above max {max}", state.attempt);

        let live_expected =
            matches!(state.phase, ConnectionPhase::Connecting | ConnectionPhase::Connected);
        assert_eq!(manager.live_generation().is_some(), live_expected, "{state:?}");
        assert_eq!(
            manager.pending_timer().is_some(),
            state.phase == ConnectionPhase::Reconnecting,
            "{state:?}"
        );
        if state.phase == ConnectionPhase::Connected {
            assert_eq!(state.attempt, 0);
        }
    }
});
