//! HarveStar IO - Console front end for the robot arm gateway
//!
//! Reads one command per line from stdin and prints each result as JSON.
//! Stands in for the HTTP layer when driving the arm by hand.

use harvestar_io::config::AppConfig;
use harvestar_io::core::types::Coords;
use harvestar_io::error::{Error, Result};
use harvestar_io::gateway::Gateway;
use serde::Serialize;
use std::env;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const HELP: &str = "\
commands:
  ready [secs]         wait for the arm to report ready
  move x y z e         move to coordinates
  replay <n>           start host-side replay n
  device-replay <n>    ask the arm to play its on-board replay n
  status               drain replay progress
  listen               print the next message from the arm
  coords               last commanded position
  stats                link traffic counters
  help                 this text
  quit                 shut down";

/// Parse config path from command line arguments.
///
/// Supports:
/// - `harvestar-io <path>` (positional)
/// - `harvestar-io --config <path>` (flag-based)
/// - `harvestar-io -c <path>` (short flag)
///
/// Returns `None` if not specified.
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return Some(args[1].clone());
    }

    None
}

fn load_config(path: Option<&str>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None if Path::new("harvestar.toml").exists() => AppConfig::from_file("harvestar.toml"),
        None => Ok(AppConfig::default()),
    }
}

/// One console line
#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Ready(Option<Duration>),
    Move(Coords),
    Replay(u32),
    DeviceReplay(u32),
    Status,
    Listen,
    Coords,
    Stats,
    Help,
    Quit,
}

impl ConsoleCommand {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let index = |args: &[&str]| -> std::result::Result<u32, String> {
            match args {
                [n] => n.parse().map_err(|_| format!("invalid index '{}'", n)),
                _ => Err("expected one index".to_string()),
            }
        };

        match verb {
            "ready" => match args.as_slice() {
                [] => Ok(Self::Ready(None)),
                [secs] => secs
                    .parse::<f64>()
                    .ok()
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .map(|d| Self::Ready(Some(d)))
                    .ok_or_else(|| format!("invalid timeout '{}'", secs)),
                _ => Err("usage: ready [secs]".to_string()),
            },
            "move" => {
                if args.len() != 4 {
                    return Err("usage: move x y z e".to_string());
                }
                let mut coords = [0.0; 4];
                for (slot, arg) in coords.iter_mut().zip(&args) {
                    *slot = arg
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| format!("invalid coordinate '{}'", arg))?;
                }
                Ok(Self::Move(coords))
            }
            "replay" => index(&args).map(Self::Replay),
            "device-replay" => index(&args).map(Self::DeviceReplay),
            "status" => Ok(Self::Status),
            "listen" => Ok(Self::Listen),
            "coords" => Ok(Self::Coords),
            "stats" => Ok(Self::Stats),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(text) => println!("{}", text),
        Err(e) => log::error!("Failed to encode output: {}", e),
    }
}

fn print_error(e: &Error) {
    print_json(&serde_json::json!({"type": "error", "message": e.to_string()}));
}

/// Execute one command. Returns `false` when the console should exit.
fn dispatch(gateway: &Arc<Gateway>, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::Ready(timeout) => {
            let ready = match timeout {
                Some(timeout) => gateway.arm_ready(timeout),
                None => gateway.arm_ready_default(),
            };
            print_json(&serde_json::json!({ "ready": ready }));
        }
        ConsoleCommand::Move(coords) => print_json(&gateway.move_arm(coords)),
        ConsoleCommand::Replay(index) => match gateway.start_replay(index) {
            Ok(()) => print_json(&serde_json::json!({
                "type": "replay",
                "index": index,
                "status": "started"
            })),
            Err(e) => print_error(&e),
        },
        ConsoleCommand::DeviceReplay(index) => {
            print_json(&gateway.trigger_device_replay(index))
        }
        ConsoleCommand::Status => print_json(&gateway.poll_replay()),
        ConsoleCommand::Listen => {
            // Off the console thread so Ctrl-C still reaches the main loop
            let gateway = Arc::clone(gateway);
            let spawned = thread::Builder::new()
                .name("console-listen".to_string())
                .spawn(move || match gateway.listen() {
                    Ok(resp) => print_json(&resp),
                    Err(e) => print_error(&e),
                });
            if let Err(e) = spawned {
                log::error!("Failed to spawn listener: {}", e);
            }
        }
        ConsoleCommand::Coords => print_json(&gateway.last_coords()),
        ConsoleCommand::Stats => print_json(&gateway.link_stats()),
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = load_config(config_path.as_deref())?;

    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("HarveStar IO v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => log::info!("Using config: {}", path),
        None => log::info!("No config file given, using defaults"),
    }
    log::info!(
        "Link: {:?} {} @ {} baud",
        config.link.kind,
        config.link.port,
        config.link.baud_rate
    );

    let gateway = Arc::new(Gateway::from_config(&config)?);

    if !gateway.arm_ready_default() {
        log::warn!("Arm did not report ready; commands may go unanswered");
    }

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Stdin is read on its own thread so the loop below can watch `running`
    let (lines_tx, lines) = crossbeam_channel::unbounded::<String>();
    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if lines_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("stdin read error: {}", e);
                        break;
                    }
                }
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn stdin reader: {}", e)))?;

    log::info!("HarveStar IO running. Type 'help' for commands, Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        let line = match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => line,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            // stdin closed
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        match ConsoleCommand::parse(&line) {
            Ok(command) => {
                if !dispatch(&gateway, command) {
                    break;
                }
            }
            Err(msg) => eprintln!("{}", msg),
        }
    }

    log::info!("Shutting down...");
    gateway.shutdown()?;
    log::info!("HarveStar IO stopped");
    Ok(())
}
