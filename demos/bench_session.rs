//! Bench Session
//!
//! This example runs a small WPC machine against the simulated board.
//!
//! Key concepts:
//! - Attract mode starting a game once the trough is full
//! - Flipper and bumper rules installed from inside a mode
//! - Driver commands posted from another thread
//! - Cooperative shutdown through a stop handle
//!
//! Run with: cargo run --example bench_session

use pinstack::config::{DriverConfig, MachineConfig, MachineType, SwitchConfig};
use pinstack::core::{EventKind, Wiring};
use pinstack::device::SimulatedDevice;
use pinstack::game::{GameLifecycle, GameRequest};
use pinstack::modes::{HandlerError, Mode, ModeContext, ModeHooks, SwitchCondition, SwitchOutcome};
use pinstack::runtime::{LoopExit, Machine, StopHandle};
use pinstack::LoopConfig;
use std::thread;
use std::time::Duration;

const START: u16 = 13;
const TROUGH: [u16; 3] = [21, 22, 23];
const SLING: u16 = 40;

fn switch(name: &str, number: u16, tags: &[&str]) -> SwitchConfig {
    SwitchConfig {
        name: name.to_string(),
        number,
        wiring: Wiring::NormallyOpen,
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}

fn coil(name: &str, number: u16) -> DriverConfig {
    DriverConfig {
        name: name.to_string(),
        number,
        pulse_ms: 30,
        is_virtual: false,
    }
}

fn config() -> MachineConfig {
    let mut config = MachineConfig::new(MachineType::Wpc);
    config.switches.push(switch("start", START, &[]));
    for (index, number) in TROUGH.iter().enumerate() {
        config
            .switches
            .push(switch(&format!("trough{index}"), *number, &["trough"]));
    }
    config.switches.push(switch("flipperLwL", 1, &[]));
    config.switches.push(switch("slingL", SLING, &[]));
    config.coils.push(coil("flipperLwLMain", 32));
    config.coils.push(coil("flipperLwLHold", 33));
    config.coils.push(coil("slingL", 41));
    config.coils.push(coil("knocker", 7));
    config.flippers.push("flipperLwL".to_string());
    config.bumpers.push("slingL".to_string());
    config.game.num_balls = TROUGH.len() as u8;
    config
}

struct Announcer;

impl GameLifecycle for Announcer {
    fn on_game_started(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        println!("  game started");
        Ok(())
    }

    fn on_ball_starting(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        let game = ctx.game();
        println!("  ball {} for player {}", game.ball, game.current_player + 1);
        Ok(())
    }
}

struct SlingHits(u32);

impl ModeHooks for SlingHits {}

fn base() -> Mode<SlingHits> {
    let mut base = Mode::new("base", 20, SlingHits(0));
    base.on("slingL", SwitchCondition::Active, |hits, _, _| {
        hits.0 += 1;
        println!("  sling hit {}", hits.0);
        Ok(SwitchOutcome::Continue)
    });
    base
}

fn attract() -> Mode<()> {
    let mut attract = Mode::new("attract", 5, ());
    attract.on("start", SwitchCondition::Active, |_, _, ctx| {
        let trough_full = ctx.switches().tagged("trough").all(|switch| switch.is_active());
        if !trough_full {
            println!("  start pressed, trough not full");
            return Ok(SwitchOutcome::Continue);
        }
        ctx.request_game(GameRequest::StartGame);
        ctx.request_game(GameRequest::AddPlayer);
        ctx.request_game(GameRequest::StartBall);
        ctx.enable_flippers(true);
        ctx.add_mode(base());
        ctx.remove_self();
        Ok(SwitchOutcome::Stop)
    });
    attract
}

fn main() {
    println!("=== Bench Session ===\n");

    let device = SimulatedDevice::new();
    for number in TROUGH {
        device.add_switch_event(number, EventKind::SwitchClosedDebounced);
    }
    device.add_switch_event(START, EventKind::SwitchClosedDebounced);
    device.add_switch_event(SLING, EventKind::SwitchClosedDebounced);
    device.add_switch_event(SLING, EventKind::SwitchOpenDebounced);

    let loop_config = LoopConfig {
        delay: Duration::from_millis(1),
        include_frame_events: false,
        ..LoopConfig::default()
    };
    let mut machine = match Machine::builder(config())
        .loop_config(loop_config)
        .lifecycle(Announcer)
        .build(device.clone())
    {
        Ok(machine) => machine,
        Err(errors) => {
            eprintln!("{errors}");
            return;
        }
    };
    machine.add_mode(attract()).ok();

    let stop = StopHandle::new();
    let queue = machine.command_queue();
    let remote = {
        let stop = stop.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            if let Err(error) = queue.enqueue_pulse("knocker", 40) {
                eprintln!("  {error}");
            }
            thread::sleep(Duration::from_millis(20));
            stop.stop();
        })
    };

    println!("Running:");
    let report = machine.run(&stop);
    remote.join().ok();

    println!("\nLoop exit: {:?}", report.exit);
    println!("Iterations: {}", report.iterations);
    println!("Flippers enabled: {}", machine.flippers_enabled());
    println!("Rules installed: {}", device.installed_rules().len());
    println!("Driver calls:");
    for call in device.driver_calls() {
        println!("  {call:?}");
    }
    assert_eq!(report.exit, LoopExit::Cancelled);

    println!("\n=== Example Complete ===");
}
