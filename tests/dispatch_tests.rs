//! Switch dispatch through a full machine: priorities, held handlers and
//! deferred stack changes.

mod common;

use common::{rig, Journal, START, TROUGH};
use pinstack::core::{Event, EventKind};
use pinstack::game::GameRequest;
use pinstack::modes::{HandlerError, Mode, ModeBuilder, ModeHooks, ModeContext, SwitchCondition, SwitchOutcome};
use std::time::Duration;

fn recorder(name: &'static str, priority: i32, journal: &Journal, outcome: SwitchOutcome) -> Mode<()> {
    let journal = journal.clone();
    ModeBuilder::new(())
        .name(name)
        .priority(priority)
        .on("start", SwitchCondition::Active, move |_, _, _| {
            journal.push(name);
            Ok(outcome)
        })
        .build()
        .unwrap()
}

#[test]
fn higher_priority_stop_hides_the_transition_from_lower_modes() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine
        .add_mode(recorder("low", 10, &journal, SwitchOutcome::Continue))
        .unwrap();
    rig.machine
        .add_mode(recorder("high", 50, &journal, SwitchOutcome::Stop))
        .unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();

    assert_eq!(journal.entries(), vec!["high"]);
}

#[test]
fn continue_lets_every_mode_see_the_transition_in_priority_order() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine
        .add_mode(recorder("low", 10, &journal, SwitchOutcome::Continue))
        .unwrap();
    rig.machine
        .add_mode(recorder("high", 50, &journal, SwitchOutcome::Continue))
        .unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();

    assert_eq!(journal.entries(), vec!["high", "low"]);
}

fn held_start(journal: &Journal) -> Mode<()> {
    let journal = journal.clone();
    let mut mode = Mode::new("service", 20, ());
    mode.on_held(
        "start",
        SwitchCondition::Active,
        Duration::from_millis(2000),
        move |_, _, ctx| {
            journal.push(format!("held@{}", ctx.now().as_millis()));
            Ok(SwitchOutcome::Continue)
        },
    );
    mode
}

#[test]
fn releasing_before_the_hold_elapses_cancels_the_handler() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine.add_mode(held_start(&journal)).unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();
    rig.clock.set(Duration::from_millis(1500));
    rig.machine.process_event(Event::switch_open(START)).unwrap();

    for ms in [2000, 2500, 4000] {
        rig.clock.set(Duration::from_millis(ms));
        rig.machine.step().unwrap();
    }

    assert!(journal.entries().is_empty());
    assert!(rig.machine.modes().timers().is_empty());
}

#[test]
fn held_handler_fires_once_when_the_hold_elapses() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine.add_mode(held_start(&journal)).unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();
    for ms in (0..=5000).step_by(100) {
        rig.clock.set(Duration::from_millis(ms));
        rig.machine.step().unwrap();
    }

    assert_eq!(journal.entries(), vec!["held@2000"]);
}

#[test]
fn pressing_again_after_a_cancelled_hold_starts_a_fresh_timer() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine.add_mode(held_start(&journal)).unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();
    rig.clock.set(Duration::from_millis(1000));
    rig.machine.process_event(Event::switch_open(START)).unwrap();
    rig.clock.set(Duration::from_millis(1200));
    rig.machine.process_event(Event::switch_closed(START)).unwrap();

    for ms in [2000, 3100, 3200, 3300] {
        rig.clock.set(Duration::from_millis(ms));
        rig.machine.step().unwrap();
    }

    assert_eq!(journal.entries(), vec!["held@3200"]);
}

fn held_for(name: &'static str, priority: i32, hold_ms: u64, journal: &Journal) -> Mode<()> {
    let journal = journal.clone();
    let mut mode = Mode::new(name, priority, ());
    mode.on_held(
        "start",
        SwitchCondition::Active,
        Duration::from_millis(hold_ms),
        move |_, _, ctx| {
            journal.push(format!("{name}@{}", ctx.now().as_millis()));
            Ok(SwitchOutcome::Continue)
        },
    );
    mode
}

#[test]
fn holds_from_different_modes_on_one_switch_run_independently() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine.add_mode(held_for("short", 30, 2000, &journal)).unwrap();
    rig.machine.add_mode(held_for("long", 20, 5000, &journal)).unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();
    assert_eq!(rig.machine.modes().timers().len(), 2);

    for ms in (0..=2900).step_by(100) {
        rig.clock.set(Duration::from_millis(ms));
        rig.machine.step().unwrap();
    }
    assert_eq!(journal.entries(), vec!["short@2000"]);
    assert_eq!(rig.machine.modes().timers().len(), 1);

    rig.clock.set(Duration::from_millis(3000));
    rig.machine.process_event(Event::switch_open(START)).unwrap();
    assert!(rig.machine.modes().timers().is_empty());

    for ms in (3000..=6000).step_by(100) {
        rig.clock.set(Duration::from_millis(ms));
        rig.machine.step().unwrap();
    }
    assert_eq!(journal.entries(), vec!["short@2000"]);
}

#[test]
fn removing_a_mode_drops_its_pending_holds() {
    let mut rig = rig();
    let journal = Journal::default();
    let id = rig.machine.add_mode(held_start(&journal)).unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();
    rig.clock.set(Duration::from_millis(500));
    assert!(rig.machine.remove_mode(id).unwrap());

    rig.clock.set(Duration::from_millis(3000));
    rig.machine.step().unwrap();
    assert!(journal.entries().is_empty());
}

#[test]
fn nondebounced_closures_count_as_closed() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine
        .add_mode(recorder("base", 10, &journal, SwitchOutcome::Continue))
        .unwrap();

    rig.device
        .add_switch_event(START, EventKind::SwitchClosedNondebounced);
    rig.machine.step().unwrap();

    assert!(rig.machine.switches().is_active("start"));
    assert_eq!(journal.len(), 1);
}

/// Starts a game when the trough is full, as attract modes do.
struct Attract {
    journal: Journal,
}

impl ModeHooks for Attract {
    fn mode_started(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        self.journal.push("attract started");
        Ok(())
    }

    fn mode_stopped(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), HandlerError> {
        self.journal.push("attract stopped");
        Ok(())
    }
}

fn attract(journal: &Journal) -> Mode<Attract> {
    ModeBuilder::new(Attract {
        journal: journal.clone(),
    })
    .name("attract")
    .priority(5)
    .on("start", SwitchCondition::Active, |attract, _, ctx| {
        let trough_full = ctx.switches().tagged("trough").all(|switch| switch.is_active());
        if trough_full {
            ctx.request_game(GameRequest::StartGame);
            ctx.request_game(GameRequest::AddPlayer);
            ctx.request_game(GameRequest::StartBall);
            ctx.remove_self();
        } else {
            attract.journal.push("trough not full");
        }
        Ok(SwitchOutcome::Continue)
    })
    .build()
    .unwrap()
}

fn trough_watch(journal: &Journal) -> Mode<()> {
    let mut mode = Mode::new("trough watch", 1, ());
    for index in 1..=TROUGH.len() {
        let journal = journal.clone();
        mode.on(format!("trough{index}"), SwitchCondition::Active, move |_, switch, _| {
            journal.push(format!("{} in", switch.name()));
            Ok(SwitchOutcome::Continue)
        });
    }
    mode
}

#[test]
fn start_is_refused_until_the_trough_is_full() {
    let mut rig = rig();
    let journal = Journal::default();
    rig.machine.add_mode(attract(&journal)).unwrap();
    rig.machine.add_mode(trough_watch(&journal)).unwrap();

    rig.machine.process_event(Event::switch_closed(START)).unwrap();
    rig.machine.process_event(Event::switch_open(START)).unwrap();
    assert!(!rig.machine.game().in_progress);

    let (last, first_three) = TROUGH.split_last().unwrap();
    for number in first_three {
        rig.machine.process_event(Event::switch_closed(*number)).unwrap();
    }
    rig.machine.process_event(Event::switch_closed(START)).unwrap();
    rig.machine.process_event(Event::switch_open(START)).unwrap();
    assert!(!rig.machine.game().in_progress);

    rig.machine.process_event(Event::switch_closed(*last)).unwrap();
    rig.machine.process_event(Event::switch_closed(START)).unwrap();

    let game = rig.machine.game();
    assert!(game.in_progress);
    assert_eq!((game.ball, game.players), (1, 1));
    assert_eq!(
        rig.machine.modes().names(),
        vec![("trough watch", 1)]
    );
    assert_eq!(
        journal.entries(),
        vec![
            "attract started",
            "trough not full",
            "trough1 in",
            "trough2 in",
            "trough3 in",
            "trough not full",
            "trough4 in",
            "attract stopped",
        ]
    );
}

#[test]
fn mode_state_is_reachable_by_id() {
    let mut rig = rig();
    let mut counter = Mode::new("counter", 1, Presses(0));
    counter.on("start", SwitchCondition::Active, |presses, _, _| {
        presses.0 += 1;
        Ok(SwitchOutcome::Continue)
    });
    let id = rig.machine.add_mode(counter).unwrap();

    for _ in 0..3 {
        rig.machine.process_event(Event::switch_closed(START)).unwrap();
        rig.machine.process_event(Event::switch_open(START)).unwrap();
    }

    let mode = rig.machine.mode::<Presses>(id).unwrap();
    assert_eq!(mode.state().0, 3);
}

struct Presses(u32);

impl ModeHooks for Presses {}
