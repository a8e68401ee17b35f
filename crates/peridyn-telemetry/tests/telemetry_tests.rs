//! Integration tests for peridyn-telemetry.

use peridyn_telemetry::{EventBus, EventKind, SimulationEvent, TracingSink, VecSink};

fn damping(step: u32, chunk: u32, coefficient: f64) -> SimulationEvent {
    SimulationEvent::new(step, EventKind::Damping { chunk, coefficient })
}

fn bus_with_capture() -> (EventBus, VecSink) {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));
    (bus, sink)
}

// ─── Bus Tests ─────────────────────────────────────────────────

#[test]
fn events_wait_for_flush() {
    let (mut bus, sink) = bus_with_capture();
    bus.emit(SimulationEvent::new(1, EventKind::TimestepBegin { sim_time: 1.0e-7 }));
    bus.emit(SimulationEvent::new(1, EventKind::TimestepEnd { wall_time: 2.0e-3 }));
    assert!(sink.is_empty());

    assert_eq!(bus.flush(), 2);
    assert_eq!(sink.len(), 2);
    assert!(matches!(sink.events()[0].kind, EventKind::TimestepBegin { .. }));
    assert_eq!(bus.flush(), 0);
}

#[test]
fn disabled_bus_hands_out_no_emitter() {
    let (mut bus, sink) = bus_with_capture();
    bus.set_enabled(false);
    assert!(!bus.is_enabled());
    assert!(bus.emitter().is_none());

    bus.emit(damping(2, 0, 0.3));
    bus.flush();
    assert!(sink.is_empty());
}

#[test]
fn worker_threads_share_one_bus() {
    let (mut bus, sink) = bus_with_capture();
    let emitter = bus.emitter().unwrap();

    std::thread::scope(|scope| {
        for rank in 0..3u32 {
            let emitter = emitter.clone();
            scope.spawn(move || {
                for step in 1..=5 {
                    emitter.emit(damping(step, rank, 0.1 * step as f64));
                }
            });
        }
    });

    assert_eq!(bus.flush(), 15);
    for rank in 0..3 {
        let own = sink.for_chunk(rank);
        assert_eq!(own.len(), 5);
        // One sender per rank: its events stay in send order.
        let steps: Vec<u32> = own.iter().map(|e| e.timestep).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5]);
    }
}

#[test]
fn every_sink_sees_every_event() {
    let mut bus = EventBus::new();
    let first = VecSink::new();
    let second = VecSink::new();
    bus.add_sink(Box::new(first.clone()));
    bus.add_sink(Box::new(TracingSink::new()));
    bus.add_sink(Box::new(second.clone()));
    assert_eq!(bus.sink_count(), 3);

    bus.emit(SimulationEvent::new(
        4,
        EventKind::ExportFailed {
            chunk: 2,
            message: "disk full".into(),
        },
    ));
    bus.emit(SimulationEvent::new(4, EventKind::RunEnd { wall_time: 0.5 }));
    bus.shutdown();

    assert_eq!(first.events(), second.events());
    assert_eq!(first.len(), 2);
}

// ─── Event Tests ───────────────────────────────────────────────

#[test]
fn chunk_of_per_chunk_events() {
    assert_eq!(damping(3, 7, 0.2).chunk(), Some(7));
    let begin = SimulationEvent::new(
        0,
        EventKind::RunBegin {
            solver: "dynamic_relaxation".into(),
            chunks: 4,
            points: 1000,
            steps: 50,
            stepsize: 1.0,
        },
    );
    assert_eq!(begin.chunk(), None);
    assert!(begin.is_run_level());
    assert!(!damping(1, 0, 0.0).is_run_level());
}

#[test]
fn events_serialize_with_a_tag() {
    let event = SimulationEvent::new(
        12,
        EventKind::Damage {
            chunk: 1,
            max_damage: 0.5,
            broken_bonds: 6,
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains(r#""event":"damage""#));

    let back: SimulationEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
