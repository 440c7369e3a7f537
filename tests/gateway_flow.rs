//! End-to-end gateway behaviour over the mock transport

use harvestar_io::config::DeviceConfig;
use harvestar_io::core::types::{Command, Response};
use harvestar_io::device::Arm;
use harvestar_io::error::Error;
use harvestar_io::gateway::Gateway;
use harvestar_io::link::{LinkWorker, DEFAULT_RESPONSE_TIMEOUT};
use harvestar_io::replay::{ReplayCatalog, ReplayPoll};
use harvestar_io::transport::{MockTransport, SimulatedArm};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn gateway_on(transport: &MockTransport, device: DeviceConfig) -> Gateway {
    let link = LinkWorker::spawn(transport.clone(), DEFAULT_RESPONSE_TIMEOUT).unwrap();
    Gateway::new(Arm::new(link, device), ReplayCatalog::builtin())
}

fn simulated() -> (MockTransport, Gateway) {
    let transport = MockTransport::new();
    transport.set_responder(SimulatedArm::new());
    let gateway = gateway_on(&transport, DeviceConfig::default());
    (transport, gateway)
}

/// Poll until the run reports done, collecting everything drained
fn drain_until_done(gateway: &Gateway, budget: Duration) -> Vec<Response> {
    let start = Instant::now();
    let mut messages = Vec::new();
    loop {
        let ReplayPoll { done, messages: batch } = gateway.poll_replay();
        messages.extend(batch);
        if done {
            return messages;
        }
        assert!(start.elapsed() < budget, "replay did not finish in time");
        thread::sleep(Duration::from_millis(50));
    }
}

fn wait_for(mut condition: impl FnMut() -> bool, budget: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < budget {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn next_command_waits_for_previous_reply() {
    let transport = MockTransport::new();
    let gateway = Arc::new(gateway_on(&transport, DeviceConfig::default()));
    let mover = |coords: [f64; 4]| {
        let gateway = Arc::clone(&gateway);
        thread::spawn(move || gateway.move_arm(coords))
    };

    let first = mover([1.0, 0.0, 10.0, 45.0]);
    assert!(wait_for(|| transport.written().len() == 1, Duration::from_secs(1)));
    let second = mover([2.0, 0.0, 10.0, 45.0]);

    // The second move is queued but stays off the wire until the first resolves
    thread::sleep(Duration::from_millis(300));
    assert_eq!(transport.written().len(), 1);

    transport.inject_line(r#"{"type":"ack","data":[1.0,0.0,10.0,45.0]}"#);
    assert!(wait_for(|| transport.written().len() == 2, Duration::from_secs(1)));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(transport.written().len(), 2);

    transport.inject_line(r#"{"type":"ack","data":[2.0,0.0,10.0,45.0]}"#);
    let first = first.join().unwrap();
    let second = second.join().unwrap();
    assert_eq!(first.get("data"), Some(&serde_json::json!([1.0, 0.0, 10.0, 45.0])));
    assert_eq!(second.get("data"), Some(&serde_json::json!([2.0, 0.0, 10.0, 45.0])));

    assert_eq!(
        transport.written_commands(),
        vec![
            Command::Move {
                data: [1.0, 0.0, 10.0, 45.0]
            },
            Command::Move {
                data: [2.0, 0.0, 10.0, 45.0]
            },
        ]
    );
}

#[test]
fn concurrent_moves_are_serialized() {
    let (transport, gateway) = simulated();
    let gateway = Arc::new(gateway);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || {
                let coords = [20.0 + i as f64, 0.0, 10.0, 45.0];
                (coords, gateway.move_arm(coords))
            })
        })
        .collect();

    for handle in handles {
        let (coords, resp) = handle.join().unwrap();
        // Each caller gets the acknowledgement for its own command
        assert!(resp.is_kind("ack"));
        assert_eq!(resp.get("data"), Some(&serde_json::json!(coords)));
    }

    let written = transport.written_commands();
    assert_eq!(written.len(), 8);
    assert!(written.iter().all(|c| matches!(c, Command::Move { .. })));
    assert_eq!(gateway.link_stats().commands_sent, 8);
}

#[test]
fn moves_from_one_caller_keep_order() {
    let (transport, gateway) = simulated();
    let targets: Vec<_> = (0..5).map(|i| [i as f64, 1.0, 2.0, 45.0]).collect();
    for coords in &targets {
        assert!(gateway.move_arm(*coords).is_kind("ack"));
    }
    let sent: Vec<_> = transport
        .written_commands()
        .into_iter()
        .map(|c| match c {
            Command::Move { data } => data,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(sent, targets);
}

#[test]
fn noise_never_surfaces() {
    let transport = MockTransport::new();
    transport.set_responder(|_line: &[u8]| {
        vec![
            "MicroPython v1.22 on Pico".to_string(),
            "{\"type\": \"ack\"".to_string(),
            r#"{"type":"ack","data":[1,2,3,4]}"#.to_string(),
        ]
    });
    let gateway = gateway_on(&transport, DeviceConfig::default());

    let resp = gateway.move_arm([1.0, 2.0, 3.0, 4.0]);
    assert!(resp.is_kind("ack"));
    assert!(gateway.link_stats().lines_discarded >= 2);
}

#[test]
fn silent_device_move_times_out() {
    let transport = MockTransport::new();
    let gateway = gateway_on(&transport, DeviceConfig::default());

    let start = Instant::now();
    let resp = gateway.move_arm([10.0, 0.0, 15.0, 45.0]);
    let elapsed = start.elapsed();

    assert_eq!(
        resp.into_value(),
        serde_json::json!({"type": "error", "message": "No response received"})
    );
    assert!(elapsed >= Duration::from_millis(4900), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "{:?}", elapsed);
}

#[test]
fn ready_on_third_ping() {
    let transport = MockTransport::new();
    let mut pings = 0;
    transport.set_responder(move |_line: &[u8]| {
        pings += 1;
        if pings < 3 {
            vec![r#"{"type":"status","message":"calibrating"}"#.to_string()]
        } else {
            vec![r#"{"type":"ready"}"#.to_string()]
        }
    });
    let gateway = gateway_on(&transport, DeviceConfig::default());

    assert!(gateway.arm_ready(Duration::from_secs(6)));
    assert_eq!(transport.written_commands(), vec![Command::Ping; 3]);
}

#[test]
fn ready_false_when_silent() {
    let transport = MockTransport::new();
    let device = DeviceConfig {
        ping_timeout_ms: 100,
        ready_retry_delay_ms: 50,
        ..DeviceConfig::default()
    };
    let gateway = gateway_on(&transport, device);

    let start = Instant::now();
    assert!(!gateway.arm_ready(Duration::from_millis(500)));
    assert!(start.elapsed() < Duration::from_millis(900));
}

#[test]
fn harvest_replay_end_to_end() {
    let (transport, gateway) = simulated();
    assert!(gateway.poll_replay().done);

    gateway.start_replay(0).unwrap();
    assert!(matches!(gateway.start_replay(0), Err(Error::ReplayBusy)));

    let messages = drain_until_done(&gateway, Duration::from_secs(20));
    assert_eq!(messages.len(), 23);
    assert!(messages[..22].iter().all(|m| m.is_kind("ack")));
    assert_eq!(messages[22], Response::done("Replay 0 completed!"));

    let moves = transport.written_commands();
    assert_eq!(moves.len(), 22);
    assert_eq!(
        moves[21],
        Command::Move {
            data: [25.0, 0.0, 10.0, 90.0]
        }
    );
    assert_eq!(gateway.last_coords(), [25.0, 0.0, 10.0, 90.0]);

    let again = gateway.poll_replay();
    assert!(again.done);
    assert!(again.messages.is_empty());
}

#[test]
fn blocking_replay_rejected_while_background_run_active() {
    let (transport, gateway) = simulated();
    gateway.start_replay(0).unwrap();
    thread::sleep(Duration::from_millis(600));

    assert!(matches!(gateway.run_replay(1), Err(Error::ReplayBusy)));

    let mid_run = gateway.poll_replay();
    assert!(!mid_run.done);
    assert!(!mid_run.messages.is_empty());

    let mut messages = mid_run.messages;
    messages.extend(drain_until_done(&gateway, Duration::from_secs(20)));
    assert_eq!(messages.len(), 23);
    assert_eq!(messages[22], Response::done("Replay 0 completed!"));
    assert_eq!(transport.written_commands().len(), 22);
}

#[test]
fn replay_over_closed_link_times_out_every_step() {
    let transport = MockTransport::disconnected();
    let device = DeviceConfig {
        move_timeout_ms: 50,
        ..DeviceConfig::default()
    };
    let gateway = gateway_on(&transport, device);

    gateway.start_replay(1).unwrap();
    let messages = drain_until_done(&gateway, Duration::from_secs(10));

    assert_eq!(messages.len(), 9);
    assert!(messages[..8].iter().all(|m| *m == Response::no_response()));
    assert_eq!(messages[8], Response::done("Replay 1 completed!"));
    assert!(transport.written().is_empty());
}

#[test]
fn unknown_replay_leaves_status_untouched() {
    let (transport, gateway) = simulated();
    assert!(matches!(
        gateway.start_replay(99),
        Err(Error::UnknownSequence(99))
    ));
    assert!(matches!(
        gateway.run_replay(99),
        Err(Error::UnknownSequence(99))
    ));
    let poll = gateway.poll_replay();
    assert!(poll.done);
    assert!(poll.messages.is_empty());
    assert!(transport.written().is_empty());
}

#[test]
fn shutdown_aborts_running_replay() {
    let (_transport, gateway) = simulated();
    gateway.start_replay(1).unwrap();
    thread::sleep(Duration::from_millis(300));

    gateway.shutdown().unwrap();

    let poll = gateway.poll_replay();
    assert!(poll.done);
    let last = poll.messages.last().unwrap();
    assert_eq!(last, &Response::error("Link worker has shut down"));
}

#[test]
fn listen_returns_unsolicited_message() {
    let (transport, gateway) = simulated();
    let gateway = Arc::new(gateway);

    let listener = {
        let gateway = Arc::clone(&gateway);
        thread::spawn(move || gateway.listen())
    };
    thread::sleep(Duration::from_millis(100));
    transport.inject_line("button pressed");
    transport.inject_line(r#"{"type":"event","name":"button"}"#);

    let resp = listener.join().unwrap().unwrap();
    assert!(resp.is_kind("event"));
    assert!(transport.written().is_empty());
}

#[test]
fn device_replay_round_trip() {
    let (transport, gateway) = simulated();
    let resp = gateway.trigger_device_replay(0);
    assert!(resp.is_kind("replay"));
    assert_eq!(
        transport.written(),
        vec![br#"{"type":"replay","index":0}"#.to_vec()]
    );
}
