//! Integration tests for the virtual sensor environment

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use virtual_sensor_env::{
    CatalogEntry, Channel, ChannelSink, Command, Orchestrator, ParameterSet, Runtime, ScriptedTriggerSource,
    SensorResult, Settings, SignalGenerator, TriggerSource, TypeTable, NO_TRIGGER,
};

fn settings(runtime: Runtime) -> Settings {
    Settings { runtime, trigger_poll_ms: 10, launch_stagger_ms: 0 }
}

fn types(co2_interval: f64) -> TypeTable {
    let mut types = TypeTable::new();
    types.insert("co2".to_string(), vec![400.0, 1000.0, co2_interval, 0.7, 0.0]);
    types.insert("gas".to_string(), vec![10.0, 30.0, 0.0, 0.8, 3.0]);
    types
}

/// Sleeps before handing out each command.
struct PacedSource {
    steps: VecDeque<(Duration, Command)>,
}

impl TriggerSource for PacedSource {
    fn read_command(&mut self) -> SensorResult<Command> {
        match self.steps.pop_front() {
            Some((delay, command)) => {
                thread::sleep(delay);
                Ok(command)
            }
            None => Ok(Command::Exit),
        }
    }
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

// ============================================================================
// GENERATION
// ============================================================================

#[test]
fn co2_step_matches_worked_example() {
    let channel = Channel::new(0, "a", ParameterSet::new(400.0, 1000.0, 30.0, 0.7, 0));
    let mut gen = SignalGenerator::new(channel).unwrap();
    assert_eq!(gen.current_value(), 700.0);
    assert_eq!(gen.apply_draw(900.0), 760.0);
}

#[test]
fn runs_with_same_catalog_order_reproduce_values() {
    let run = || {
        let (sink, rx) = ChannelSink::new(64);
        let orchestrator = Orchestrator::new(settings(Runtime::Threads), "/base", Arc::new(sink));
        let catalog = vec![CatalogEntry::typed("first", "co2"), CatalogEntry::typed("a", "co2")];
        let report = orchestrator.run(&catalog, &types(3600.0), &mut ScriptedTriggerSource::default()).unwrap();
        assert!(report.rejected.is_empty());
        let mut values: Vec<_> = rx.try_iter().map(|p| (p.subtopic, p.value)).collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    };

    let first = run();
    let second = run();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);

    // Channel "a" is id 1, so its first value is the first step of stream 1.
    let params = ParameterSet::new(400.0, 1000.0, 3600.0, 0.7, 0);
    let expected = SignalGenerator::new(Channel::new(1, "a", params)).unwrap().next_value();
    assert_eq!(first[0], ("/base/a".to_string(), expected));
}

// ============================================================================
// PERIODIC MODE
// ============================================================================

#[test]
fn periodic_channel_publishes_on_interval() {
    let (sink, rx) = ChannelSink::new(256);
    let orchestrator = Orchestrator::new(settings(Runtime::Threads), "/base", Arc::new(sink));
    let catalog = vec![CatalogEntry::typed("a", "co2")];
    let mut source = PacedSource { steps: VecDeque::from([(Duration::from_millis(250), Command::Exit)]) };

    let report = orchestrator.run(&catalog, &types(0.05), &mut source).unwrap();

    let publications: Vec<_> = rx.try_iter().collect();
    assert!(publications.len() >= 3, "only {} publications", publications.len());
    assert!(publications.iter().all(|p| p.subtopic == "/base/a"));
    assert!(publications.iter().all(|p| (400.0..=1000.0).contains(&p.value) && p.value == p.value.round()));
    for pair in publications.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= Duration::from_millis(45));
    }
    assert_eq!(report.shutdown.channels[0].published, publications.len() as u64);
}

// ============================================================================
// TRIGGERED MODE
// ============================================================================

fn triggered_scenario(runtime: Runtime) {
    let (sink, rx) = ChannelSink::new(64);
    let orchestrator = Orchestrator::new(settings(runtime), "/base", Arc::new(sink));
    let catalog: Vec<_> = ["g0", "g1", "g2", "g3", "g4"].iter().map(|n| CatalogEntry::typed(n, "gas")).collect();
    let resolved = virtual_sensor_env::resolve_catalog(&catalog, &types(30.0));
    let fleet = orchestrator.launch(resolved.channels).unwrap();
    let coordinator = orchestrator.coordinator();

    thread::sleep(Duration::from_millis(30));
    assert!(rx.try_recv().is_err(), "triggered channels must stay silent until triggered");

    coordinator.set_pending(3);
    let ch3 = fleet.stats(3).unwrap();
    assert!(wait_until(Duration::from_secs(2), || ch3.published() == 1));
    assert_eq!(coordinator.pending(), NO_TRIGGER);

    thread::sleep(Duration::from_millis(50));
    let publications: Vec<_> = rx.try_iter().collect();
    assert_eq!(publications.len(), 1);
    assert_eq!(publications[0].subtopic, "/base/g3");
    for id in [0, 1, 2, 4] {
        assert_eq!(fleet.stats(id).unwrap().published(), 0);
    }

    // A second trigger releases the next value of the same channel.
    coordinator.set_pending(3);
    assert!(wait_until(Duration::from_secs(2), || ch3.published() == 2));

    let report = orchestrator.shutdown(fleet);
    assert_eq!(report.metrics.triggers_consumed, 2);
    assert_eq!(report.channels.iter().map(|c| c.published).sum::<u64>(), 2);
}

#[test]
fn trigger_releases_only_matching_channel_on_threads() {
    triggered_scenario(Runtime::Threads);
}

#[test]
fn trigger_releases_only_matching_channel_on_tokio() {
    triggered_scenario(Runtime::Tokio);
}

#[test]
fn operator_commands_drive_triggered_channel() {
    let (sink, rx) = ChannelSink::new(64);
    let orchestrator = Orchestrator::new(settings(Runtime::Threads), "/base", Arc::new(sink));
    let catalog = vec![CatalogEntry::typed("a", "co2"), CatalogEntry::typed("sec01", "gas")];
    let mut source = PacedSource {
        steps: VecDeque::from([
            (Duration::from_millis(20), Command::Trigger(1)),
            (Duration::from_millis(200), Command::Exit),
        ]),
    };

    let report = orchestrator.run(&catalog, &types(3600.0), &mut source).unwrap();

    assert_eq!(report.control.forwarded, 1);
    let triggered: Vec<_> = rx.try_iter().filter(|p| p.subtopic == "/base/sec01").collect();
    assert_eq!(triggered.len(), 1);
    assert!((10.0..=30.0).contains(&triggered[0].value));
    assert_eq!(report.shutdown.metrics.triggers_issued, 1);
}

#[test]
fn shutdown_stops_workers_promptly() {
    for runtime in [Runtime::Threads, Runtime::Tokio] {
        let (sink, _rx) = ChannelSink::new(64);
        let orchestrator = Orchestrator::new(settings(runtime), "/base", Arc::new(sink));
        let catalog = vec![CatalogEntry::typed("a", "co2"), CatalogEntry::typed("b", "gas")];

        let start = Instant::now();
        orchestrator.run(&catalog, &types(3600.0), &mut ScriptedTriggerSource::default()).unwrap();
        assert!(start.elapsed() < Duration::from_secs(3), "{:?} shutdown took {:?}", runtime, start.elapsed());
    }
}
