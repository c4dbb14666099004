//! Dispatch scenarios replayed by the runner.
//!
//! Every scenario builds its own [`EventSystem`] and registry so results
//! do not leak between runs.

use anyhow::{ensure, Result};
use event_callbacks::{
    create_event_system, CallbackRef, CallbacksConfig, Event, EventCallbacks, EventSystem,
    EventSystemStats, KeyPolicy, PlayerEvent, PlayerEventCallback, PlayerId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

const SCENARIO_PLUGIN: &str = "scenario_runner";

#[derive(Debug)]
struct ScenarioEvent;

impl Event for ScenarioEvent {
    fn event_type() -> &'static str {
        "scenario_event"
    }
}

#[derive(Debug)]
struct PlayerMovedEvent {
    player_id: PlayerId,
}

impl Event for PlayerMovedEvent {
    fn event_type() -> &'static str {
        "player_moved"
    }
}

impl PlayerEvent for PlayerMovedEvent {
    fn player(&self) -> Option<PlayerId> {
        Some(self.player_id)
    }
}

type ScenarioFn = fn(&ScenarioContext) -> Result<()>;

/// A fresh bus and registry for one scenario.
struct ScenarioContext {
    events: Arc<EventSystem>,
    callbacks: EventCallbacks,
    policy: KeyPolicy,
}

impl ScenarioContext {
    fn new(config: CallbacksConfig) -> Result<Self> {
        let events = create_event_system();
        events.enable_plugin(SCENARIO_PLUGIN);
        let callbacks = EventCallbacks::with_config(SCENARIO_PLUGIN, events.clone(), config)?;
        Ok(Self {
            events,
            callbacks,
            policy: config.key_policy,
        })
    }
}

/// Result of a single scenario run.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: &'static str,
    pub result: Result<()>,
    pub bus_stats: EventSystemStats,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

const SCENARIOS: &[(&str, ScenarioFn)] = &[
    ("handled callbacks are removed", handled_callbacks_are_removed),
    ("identical callback is deduplicated", identical_callback_is_deduplicated),
    ("player callback waits for its target", player_callback_waits_for_target),
    ("owner disable clears everything", owner_disable_clears_everything),
];

/// Runs every scenario against `config` and logs each outcome.
pub fn run_all(config: CallbacksConfig) -> Vec<ScenarioOutcome> {
    SCENARIOS
        .iter()
        .map(|&(name, scenario)| {
            debug!("Running scenario: {}", name);
            let (result, bus_stats) = match ScenarioContext::new(config) {
                Ok(context) => (scenario(&context), context.events.get_stats()),
                Err(e) => (Err(e), EventSystemStats::default()),
            };
            match &result {
                Ok(()) => info!("✅ {}", name),
                Err(e) => error!("❌ {}: {:#}", name, e),
            }
            ScenarioOutcome {
                name,
                result,
                bus_stats,
            }
        })
        .collect()
}

fn recording(
    log: &Arc<Mutex<Vec<&'static str>>>,
    label: &'static str,
    handled: bool,
) -> CallbackRef<ScenarioEvent> {
    let log = log.clone();
    CallbackRef::new(move |_: &ScenarioEvent| {
        if let Ok(mut log) = log.lock() {
            log.push(label);
        }
        handled
    })
}

fn drain(log: &Mutex<Vec<&'static str>>) -> Vec<&'static str> {
    log.lock().map(|mut log| std::mem::take(&mut *log)).unwrap_or_default()
}

fn handled_callbacks_are_removed(ctx: &ScenarioContext) -> Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    ctx.callbacks.register(recording(&log, "A", true))?;
    ctx.callbacks.register(recording(&log, "B", false))?;
    ctx.callbacks.register(recording(&log, "C", true))?;

    ctx.events.fire(&ScenarioEvent);
    let first = drain(&log);
    ensure!(first == ["A", "B", "C"], "first firing invoked {:?}", first);

    ctx.events.fire(&ScenarioEvent);
    let second = drain(&log);
    ensure!(second == ["B"], "second firing invoked {:?}", second);
    Ok(())
}

fn identical_callback_is_deduplicated(ctx: &ScenarioContext) -> Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let callback = recording(&log, "same", false);
    let first = ctx.callbacks.register(callback.clone())?;
    let second = ctx.callbacks.register(callback)?;

    ctx.events.fire(&ScenarioEvent);
    let calls = drain(&log).len();

    // Each registration gets its own key unless keys are shared.
    let expected = match ctx.policy {
        KeyPolicy::SharedByEventType => 1,
        KeyPolicy::PerRegistration => 2,
    };
    ensure!(
        calls == expected,
        "{} and {} invoked the callback {} times, expected {}",
        first,
        second,
        calls,
        expected
    );
    Ok(())
}

fn player_callback_waits_for_target(ctx: &ScenarioContext) -> Result<()> {
    let target = PlayerId::new();
    let bystander = PlayerId::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    let key = ctx.callbacks.register(
        PlayerEventCallback::new(target, move |_: &PlayerMovedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .into_ref(),
    )?;

    ctx.events.fire(&PlayerMovedEvent {
        player_id: bystander,
    });
    ensure!(
        hits.load(Ordering::SeqCst) == 0,
        "hook ran for another player"
    );
    ensure!(ctx.callbacks.callback_count(&key) == 1, "callback dropped early");

    ctx.events.fire(&PlayerMovedEvent { player_id: target });
    ctx.events.fire(&PlayerMovedEvent { player_id: target });
    ensure!(
        hits.load(Ordering::SeqCst) == 1,
        "hook ran {} times",
        hits.load(Ordering::SeqCst)
    );
    ensure!(
        ctx.callbacks.callback_count(&key) == 0,
        "callback still registered after matching"
    );
    Ok(())
}

fn owner_disable_clears_everything(ctx: &ScenarioContext) -> Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    ctx.callbacks.register(recording(&log, "A", false))?;
    ctx.callbacks.register(recording(&log, "B", false))?;

    ensure!(
        ctx.events.disable_plugin(SCENARIO_PLUGIN),
        "plugin was not enabled"
    );
    ctx.events.fire(&ScenarioEvent);

    let calls = drain(&log);
    ensure!(calls.is_empty(), "invoked {:?} after disable", calls);
    ensure!(
        ctx.callbacks.active_keys().is_empty(),
        "keys survived disable"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_callbacks::EventPriority;

    #[test]
    fn test_all_scenarios_pass_for_both_policies() {
        for key_policy in [KeyPolicy::PerRegistration, KeyPolicy::SharedByEventType] {
            let config = CallbacksConfig {
                key_policy,
                default_priority: EventPriority::Normal,
                ..CallbacksConfig::default()
            };
            for outcome in run_all(config) {
                assert!(
                    outcome.passed(),
                    "{} failed under {:?}: {:?}",
                    outcome.name,
                    key_policy,
                    outcome.result
                );
            }
        }
    }

    #[test]
    fn test_outcomes_carry_bus_stats() {
        let outcomes = run_all(CallbacksConfig::default());
        assert_eq!(outcomes.len(), SCENARIOS.len());
        assert!(outcomes.iter().all(|outcome| outcome.bus_stats.events_fired > 0));
    }
}
