//! Playback engine: run, pause, single-step and time travel over a compiled
//! action list.
//!
//! The engine owns one explicit [`RunStatus`] and at most one pending timer.
//! Every operation that supersedes the current playback cancels that timer
//! first, and `fire` ignores any id that is not the pending one, so a late
//! tick can never act on replaced state.
//!
//! World state is never snapshotted. Jumping to step `n` folds the first `n`
//! actions from the initial state again.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::action::Action;
use super::env::{Environment, EnvironmentRegistry, StepStatus, replay};
use super::level::{GameMode, LevelConfig};
use super::outcome::{RunOutcome, RunStatus, star_rating};
use super::reference::ReferenceModel;
use super::schedule::{Scheduler, TimerId, VirtualClock, settle_delay, tick_delay};
use super::state::WorldState;
use crate::compiler::{ActionCompiler, CompiledProgram};
use crate::consts::{MAX_SPEED, SETTLE_DELAY_MS};
use crate::error::{EngineError, ReplayFault};
use crate::proof::{HourSource, ProofTokenGenerator};
use crate::settings::Settings;

/// Outcome waiting for its animation delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// `step` reported WIN
    Win,
    /// `step` reported LOST
    Lose,
    /// Actions ran out; ask `check_victory`
    Verdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    Advance,
    Settle(Settlement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub timer: TimerId,
    pub wakeup: Wakeup,
}

/// Notifications for hosts that subscribe rather than poll
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    Started { total_steps: usize },
    Stepped { step: usize, action: usize },
    Paused { step: usize },
    Resumed { step: usize },
    Reset,
    Cleared,
    Traveled { step: usize },
    Settled { outcome: RunOutcome },
    Faulted { step: usize, message: String },
}

/// What the UI renders after each tick
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineView<'a> {
    pub state: Option<&'a WorldState>,
    pub last_action: Option<&'a Action>,
    pub step: usize,
    pub total_steps: usize,
    pub status: RunStatus,
    pub outcome: Option<&'a RunOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<&'a ReferenceModel>,
}

pub struct SimulationEngine<S: Scheduler> {
    env: Arc<dyn Environment>,
    level: LevelConfig,
    compiler: Box<dyn ActionCompiler>,
    scheduler: S,
    settings: Settings,
    tokens: ProofTokenGenerator,
    reference: Option<ReferenceModel>,

    /// Survives `reset`; dropped by `clear_simulation`
    timeline: Option<CompiledProgram>,
    /// `None` until the first action of a run (or a time-travel jump)
    state: Option<WorldState>,
    /// Index of the next action to execute
    step: usize,
    last_action: Option<usize>,
    status: RunStatus,
    outcome: Option<RunOutcome>,
    pending: Option<Pending>,
    events: Vec<EngineEvent>,
}

impl<S: Scheduler> std::fmt::Debug for SimulationEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("mode", &self.env.mode())
            .field("level", &self.level.id)
            .field("status", &self.status)
            .field("step", &self.step)
            .field("total_steps", &self.total_steps())
            .field("pending", &self.pending)
            .finish()
    }
}

impl<S: Scheduler> SimulationEngine<S> {
    /// Engine for `level`, using the environment registered for its mode.
    ///
    /// The level's reference solution (if any) is folded here, once.
    pub fn new(
        registry: &EnvironmentRegistry,
        level: LevelConfig,
        compiler: Box<dyn ActionCompiler>,
        scheduler: S,
    ) -> Result<Self, EngineError> {
        let Some(env) = registry.get(level.mode) else {
            let known: Vec<GameMode> = registry.modes().collect();
            log::error!("No environment for {} (registered: {:?})", level.mode, known);
            return Err(EngineError::UnsupportedMode(level.mode));
        };
        let reference =
            ReferenceModel::for_level(env.as_ref(), &level).map_err(EngineError::Setup)?;

        log::info!(
            "Engine ready for {} level '{}' (reference: {})",
            level.mode,
            level.id,
            reference.is_some()
        );

        Ok(Self {
            env,
            level,
            compiler,
            scheduler,
            settings: Settings::default(),
            tokens: ProofTokenGenerator::default(),
            reference,
            timeline: None,
            state: None,
            step: 0,
            last_action: None,
            status: RunStatus::Idle,
            outcome: None,
            pending: None,
            events: Vec::new(),
        })
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_hour_source(mut self, clock: Box<dyn HourSource>) -> Self {
        self.tokens = ProofTokenGenerator::new(clock);
        self
    }

    // === Accessors ===

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.timeline.as_ref().map_or(0, CompiledProgram::len)
    }

    pub fn state(&self) -> Option<&WorldState> {
        self.state.as_ref()
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn level(&self) -> &LevelConfig {
        &self.level
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn reference(&self) -> Option<&ReferenceModel> {
        self.reference.as_ref()
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn view(&self) -> EngineView<'_> {
        let last_action = match (self.last_action, &self.timeline) {
            (Some(index), Some(program)) => program.actions.get(index),
            _ => None,
        };
        EngineView {
            state: self.state.as_ref(),
            last_action,
            step: self.step,
            total_steps: self.total_steps(),
            status: self.status,
            outcome: self.outcome.as_ref(),
            reference: self.reference.as_ref().filter(|_| self.settings.show_reference),
        }
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Takes effect at the next scheduled tick
    pub fn set_speed(&mut self, speed: u8) {
        self.settings.speed = speed.min(MAX_SPEED);
        log::debug!("Speed set to {}", self.settings.speed);
    }

    /// Swap the program source. The old timeline no longer matches the code,
    /// so the simulation is cleared.
    pub fn set_compiler(&mut self, compiler: Box<dyn ActionCompiler>) {
        self.compiler = compiler;
        self.clear_simulation();
    }

    // === Operations ===

    /// Resume when paused; otherwise reset, recompile and play from step 0.
    pub fn run(&mut self) -> Result<(), EngineError> {
        if self.status == RunStatus::Paused {
            self.status = RunStatus::Running;
            self.events.push(EngineEvent::Resumed { step: self.step });
            log::info!("Resumed at step {}", self.step);
            if self.pending.is_none() {
                self.schedule_advance();
            }
            return Ok(());
        }

        self.start(RunStatus::Running)?;
        self.tick(true)
    }

    /// Stop auto-play. A pending win/loss/verdict still lands.
    pub fn pause(&mut self) {
        if self.status != RunStatus::Running {
            return;
        }
        if let Some(Pending {
            wakeup: Wakeup::Advance,
            ..
        }) = self.pending
        {
            self.cancel_pending();
        }
        self.status = RunStatus::Paused;
        self.events.push(EngineEvent::Paused { step: self.step });
        log::info!("Paused at step {}", self.step);
    }

    /// Execute exactly one action, then stay paused.
    pub fn step_forward(&mut self) -> Result<(), EngineError> {
        if self.settling() {
            log::debug!("Step ignored while an outcome is pending");
            return Ok(());
        }
        match self.status {
            RunStatus::Running => self.pause(),
            RunStatus::Paused => {}
            RunStatus::Idle | RunStatus::Won | RunStatus::Lost | RunStatus::Failed => {
                self.start(RunStatus::Paused)?;
            }
        }
        self.tick(false)
    }

    /// Back to step 0 and IDLE. The compiled timeline stays scrubbable.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.state = None;
        self.step = 0;
        self.last_action = None;
        self.outcome = None;
        self.status = RunStatus::Idle;
        self.events.push(EngineEvent::Reset);
        log::debug!("Reset (timeline: {} steps)", self.total_steps());
    }

    /// Drop the timeline too; used when the program changes.
    pub fn clear_simulation(&mut self) {
        self.timeline = None;
        self.reset();
        self.events.push(EngineEvent::Cleared);
    }

    /// Rebuild the state after the first `n` actions and pause there.
    /// `n` past the end clamps to the end.
    pub fn go_to_step(&mut self, n: usize) -> Result<(), EngineError> {
        if self.timeline.is_none() {
            return Err(EngineError::NoTimeline);
        }
        self.cancel_pending();
        let actions = self.timeline.as_ref().map_or(&[][..], |p| p.actions.as_slice());
        let n = n.min(actions.len());
        let rebuilt = replay(self.env.as_ref(), &self.level, &actions[..n]);

        self.outcome = None;
        match rebuilt {
            Ok(state) => {
                self.state = Some(state);
                self.step = n;
                self.last_action = n.checked_sub(1);
                self.status = RunStatus::Paused;
                self.events.push(EngineEvent::Traveled { step: n });
                log::debug!("Traveled to step {}", n);
                Ok(())
            }
            Err(fault) => Err(self.fault(fault)),
        }
    }

    /// Deliver a timer. Ids other than the pending one are stale and ignored.
    pub fn fire(&mut self, timer: TimerId) -> Result<(), EngineError> {
        let pending = match self.pending {
            Some(pending) if pending.timer == timer => pending,
            _ => {
                log::trace!("Ignoring stale timer {:?}", timer);
                return Ok(());
            }
        };
        self.pending = None;

        match pending.wakeup {
            Wakeup::Advance if self.status == RunStatus::Running => self.tick(true),
            Wakeup::Advance => Ok(()),
            Wakeup::Settle(settlement) => self.settle(settlement),
        }
    }

    // === Internals ===

    fn settling(&self) -> bool {
        matches!(
            self.pending,
            Some(Pending {
                wakeup: Wakeup::Settle(_),
                ..
            })
        )
    }

    fn block_count(&self) -> u32 {
        self.timeline.as_ref().map_or(0, |program| program.block_count)
    }

    /// Reset, recompile and enter `status`. A compile error leaves the engine
    /// IDLE with its previous timeline.
    fn start(&mut self, status: RunStatus) -> Result<(), EngineError> {
        self.reset();
        let program = self.compiler.compile().map_err(|err| {
            log::warn!("Compilation failed: {}", err);
            err
        })?;
        log::info!(
            "Starting '{}': {} actions, {} blocks",
            self.level.id,
            program.len(),
            program.block_count
        );
        self.events.push(EngineEvent::Started {
            total_steps: program.len(),
        });
        self.timeline = Some(program);
        self.status = status;
        Ok(())
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.scheduler.cancel(pending.timer);
        }
    }

    fn schedule(&mut self, delay: Duration, wakeup: Wakeup) {
        self.cancel_pending();
        let timer = self.scheduler.schedule(delay);
        self.pending = Some(Pending { timer, wakeup });
    }

    fn schedule_advance(&mut self) {
        let last = self.view().last_action.cloned();
        let delay = tick_delay(self.settings.speed, self.env.mode(), last.as_ref());
        self.schedule(delay, Wakeup::Advance);
    }

    fn schedule_settle(&mut self, settlement: Settlement) {
        let delay = match settlement {
            Settlement::Lose => Duration::from_millis(SETTLE_DELAY_MS),
            Settlement::Win | Settlement::Verdict => settle_delay(self.env.mode()),
        };
        log::debug!("Settling {:?} in {:?}", settlement, delay);
        self.schedule(delay, Wakeup::Settle(settlement));
    }

    /// Execute the next action and arrange whatever follows it.
    fn tick(&mut self, autoplay: bool) -> Result<(), EngineError> {
        let total = self.total_steps();
        if self.step >= total {
            self.schedule_settle(Settlement::Verdict);
            return Ok(());
        }

        match self.execute_next()? {
            StepStatus::Win => self.schedule_settle(Settlement::Win),
            StepStatus::Lost => self.schedule_settle(Settlement::Lose),
            StepStatus::Running if self.step >= total => self.schedule_settle(Settlement::Verdict),
            StepStatus::Running if autoplay => self.schedule_advance(),
            StepStatus::Running => {}
        }
        Ok(())
    }

    fn execute_next(&mut self) -> Result<StepStatus, EngineError> {
        let index = self.step;
        let action = match self.timeline.as_ref().and_then(|p| p.actions.get(index)) {
            Some(action) => action.clone(),
            None => return Err(EngineError::NoTimeline),
        };

        let status = if action.is_scan() {
            // A leading SCAN still leaves the world in its initial state
            if self.state.is_none() {
                match self.env.initial_state(&self.level) {
                    Ok(initial) => self.state = Some(initial),
                    Err(fault) => return Err(self.fault(fault.at_step(index))),
                }
            }
            StepStatus::Running
        } else {
            match self.env.step(self.state.as_ref(), Some(&action), &self.level) {
                Ok(result) => {
                    self.state = Some(result.state);
                    result.status
                }
                Err(fault) => return Err(self.fault(fault.at_step(index))),
            }
        };

        self.step = index + 1;
        self.last_action = Some(index);
        self.events.push(EngineEvent::Stepped {
            step: self.step,
            action: index,
        });
        log::trace!("Step {} -> {:?}", index, status);
        Ok(status)
    }

    fn settle(&mut self, settlement: Settlement) -> Result<(), EngineError> {
        let base = RunOutcome::running(self.block_count(), self.level.target_blocks());
        let outcome = match settlement {
            Settlement::Win => self.won(&base),
            Settlement::Lose => base.with_status(RunStatus::Lost),
            Settlement::Verdict => {
                let victory = match &self.state {
                    Some(state) => self.env.check_victory(state, &self.level, self.reference.as_ref()),
                    None => self.env.initial_state(&self.level).and_then(|initial| {
                        self.env.check_victory(&initial, &self.level, self.reference.as_ref())
                    }),
                };
                match victory {
                    Ok(true) => self.won(&base),
                    Ok(false) => base.with_status(RunStatus::Failed),
                    Err(fault) => return Err(self.fault(fault.at_step(self.step))),
                }
            }
        };

        log::info!(
            "Level '{}' {} (stars: {}, blocks: {}/{})",
            self.level.id,
            outcome.status.as_str(),
            outcome.stars,
            outcome.block_count,
            outcome.target
        );
        self.status = outcome.status;
        self.events.push(EngineEvent::Settled {
            outcome: outcome.clone(),
        });
        self.outcome = Some(outcome);
        Ok(())
    }

    fn won(&self, base: &RunOutcome) -> RunOutcome {
        let stars = star_rating(base.block_count, base.target);
        let token = self.tokens.generate(&self.level.id, stars, base.block_count);
        base.won(token)
    }

    /// Halt playback in PAUSED and hand the fault back to the caller.
    fn fault(&mut self, fault: ReplayFault) -> EngineError {
        self.cancel_pending();
        self.status = RunStatus::Paused;
        log::error!("{}: {}", fault, fault.fault);
        self.events.push(EngineEvent::Faulted {
            step: fault.step,
            message: fault.fault.to_string(),
        });
        EngineError::Fault(fault)
    }
}

impl SimulationEngine<VirtualClock> {
    /// Fire virtual timers until none remain; returns the final status.
    pub fn drive(&mut self) -> Result<RunStatus, EngineError> {
        while let Some(timer) = self.scheduler.pop_next() {
            self.fire(timer)?;
        }
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::StaticProgram;
    use crate::error::{CompileError, FaultKind};
    use crate::proof::{FixedHour, verify_token};
    use crate::sim::action::Operator;
    use crate::sim::level::{EquationSpec, GameMode, StartPos};
    use crate::sim::state::MazeState;
    use proptest::prelude::*;

    fn corridor() -> LevelConfig {
        LevelConfig {
            id: "corridor".into(),
            mode: GameMode::Maze,
            grid: vec![vec![4, 4, 4, 4], vec![4, 2, 1, 3], vec![4, 4, 4, 4]],
            start_pos: Some(StartPos {
                x: 1.0,
                y: 1.0,
                dir: 0.0,
            }),
            ..Default::default()
        }
    }

    fn engine(level: LevelConfig, actions: Vec<Action>) -> SimulationEngine<VirtualClock> {
        let compiler = StaticProgram::new(CompiledProgram::from_actions(actions));
        SimulationEngine::new(
            &EnvironmentRegistry::builtin(),
            level,
            Box::new(compiler),
            VirtualClock::new(),
        )
        .unwrap()
        .with_hour_source(Box::new(FixedHour(12)))
    }

    fn maze_pos(engine: &SimulationEngine<VirtualClock>) -> Option<(i32, i32)> {
        match engine.state() {
            Some(WorldState::Maze(MazeState { x, y, .. })) => Some((*x, *y)),
            _ => None,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_run_reaches_goal() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.run().unwrap();
        assert_eq!(e.status(), RunStatus::Running);
        assert_eq!(e.step(), 1);

        assert_eq!(e.drive().unwrap(), RunStatus::Won);
        let outcome = e.outcome().unwrap();
        assert_eq!(outcome.stars, 3);
        assert_eq!(outcome.block_count, 2);
        assert_eq!(outcome.target, 5);
        let token = outcome.proof_token.as_deref().unwrap();
        assert!(token.starts_with("LVL:corridor|ST:3|BL:2|#"));
        assert!(verify_token(token, 12));
        assert_eq!(maze_pos(&e), Some((3, 1)));
    }

    #[test]
    fn test_wall_bump_loses() {
        let mut e = engine(corridor(), vec![Action::turn_right(), Action::step(), Action::step()]);
        e.run().unwrap();
        assert_eq!(e.drive().unwrap(), RunStatus::Lost);
        // The remaining action never ran
        assert_eq!(e.step(), 2);
        assert_eq!(e.outcome().unwrap().proof_token, None);
    }

    #[test]
    fn test_exhausted_without_goal_fails() {
        let mut e = engine(corridor(), vec![Action::step()]);
        e.run().unwrap();
        assert_eq!(e.drive().unwrap(), RunStatus::Failed);
        assert_eq!(e.outcome().unwrap().stars, 0);
    }

    #[test]
    fn test_empty_program_gets_verdict() {
        let mut e = engine(corridor(), vec![]);
        e.run().unwrap();
        assert_eq!(e.drive().unwrap(), RunStatus::Failed);
        assert!(e.state().is_none());
    }

    #[test]
    fn test_star_rating_uses_block_count() {
        let mut level = corridor();
        level.max_blocks = Some(1);
        let mut e = engine(level, vec![Action::step(), Action::step()]);
        e.run().unwrap();
        e.drive().unwrap();
        assert_eq!(e.outcome().unwrap().stars, 2);
    }

    #[test]
    fn test_autoplay_timing() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.set_speed(50);
        e.run().unwrap();
        assert_eq!(e.scheduler().pending_count(), 1);
        e.drive().unwrap();
        // 500ms tick, then 500ms settle
        assert_eq!(e.scheduler().now(), ms(1000));
    }

    #[test]
    fn test_scan_holds_the_tick() {
        let actions = vec![Action::scan(), Action::step(), Action::step()];
        let mut e = engine(corridor(), actions);
        e.set_speed(100);
        e.run().unwrap();
        assert_eq!(maze_pos(&e), Some((1, 1)));
        e.drive().unwrap();
        assert_eq!(e.status(), RunStatus::Won);
        assert_eq!(e.scheduler().now(), ms(500 + 5 + 500));
    }

    #[test]
    fn test_equation_pacing() {
        let level = LevelConfig {
            id: "eq".into(),
            mode: GameMode::Equation,
            equation: Some(EquationSpec {
                lhs: "2x + 3".into(),
                rhs: "7".into(),
                variable: "x".into(),
                sign: "=".into(),
                implicit: true,
            }),
            ..Default::default()
        };
        let actions = vec![
            Action::op_both(Operator::Subtract, "3"),
            Action::op_both(Operator::Divide, "2"),
        ];
        let mut e = engine(level, actions);
        e.set_speed(100);
        e.run().unwrap();
        assert_eq!(e.drive().unwrap(), RunStatus::Won);
        assert_eq!(e.scheduler().now(), ms(2500 + 3000));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.run().unwrap();
        e.pause();
        assert_eq!(e.status(), RunStatus::Paused);
        assert_eq!(e.scheduler().pending_count(), 0);
        assert_eq!(e.step(), 1);

        e.run().unwrap();
        assert_eq!(e.status(), RunStatus::Running);
        // Resume keeps the position; no recompile or restart
        assert_eq!(e.step(), 1);
        assert_eq!(e.drive().unwrap(), RunStatus::Won);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.run().unwrap();
        let stale = e.pending().unwrap().timer;
        e.pause();
        e.fire(stale).unwrap();
        assert_eq!(e.status(), RunStatus::Paused);
        assert_eq!(e.step(), 1);

        e.go_to_step(0).unwrap();
        e.fire(stale).unwrap();
        assert_eq!(e.step(), 0);
    }

    #[test]
    fn test_pause_keeps_pending_outcome() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.step_forward().unwrap();
        e.step_forward().unwrap();
        assert!(matches!(
            e.pending().map(|p| p.wakeup),
            Some(Wakeup::Settle(Settlement::Win))
        ));
        e.pause();
        // Already paused; stepping while settling does nothing
        e.step_forward().unwrap();
        assert_eq!(e.step(), 2);
        assert_eq!(e.drive().unwrap(), RunStatus::Won);
    }

    #[test]
    fn test_step_forward_from_idle() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.step_forward().unwrap();
        assert_eq!(e.status(), RunStatus::Paused);
        assert_eq!(e.step(), 1);
        assert_eq!(maze_pos(&e), Some((2, 1)));
        assert_eq!(e.scheduler().pending_count(), 0);
    }

    #[test]
    fn test_step_forward_while_running_pauses_first() {
        let mut e = engine(corridor(), vec![Action::turn_left(), Action::turn_left(), Action::step()]);
        e.run().unwrap();
        e.step_forward().unwrap();
        assert_eq!(e.status(), RunStatus::Paused);
        assert_eq!(e.step(), 2);
        assert_eq!(e.scheduler().pending_count(), 0);
    }

    #[test]
    fn test_step_forward_after_terminal_restarts() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.run().unwrap();
        e.drive().unwrap();
        e.step_forward().unwrap();
        assert_eq!(e.status(), RunStatus::Paused);
        assert_eq!(e.step(), 1);
        assert!(e.outcome().is_none());
    }

    #[test]
    fn test_reset_keeps_timeline() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.run().unwrap();
        e.drive().unwrap();
        e.reset();
        assert_eq!(e.status(), RunStatus::Idle);
        assert!(e.state().is_none());
        assert_eq!(e.step(), 0);
        assert_eq!(e.total_steps(), 2);

        e.go_to_step(1).unwrap();
        assert_eq!(maze_pos(&e), Some((2, 1)));
    }

    #[test]
    fn test_clear_simulation_drops_timeline() {
        let mut e = engine(corridor(), vec![Action::step()]);
        e.run().unwrap();
        e.clear_simulation();
        assert_eq!(e.total_steps(), 0);
        assert_eq!(e.scheduler().pending_count(), 0);
        assert!(matches!(e.go_to_step(0), Err(EngineError::NoTimeline)));
    }

    #[test]
    fn test_go_to_step_rebuilds_and_clamps() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.run().unwrap();
        e.go_to_step(0).unwrap();
        assert_eq!(e.status(), RunStatus::Paused);
        assert_eq!(maze_pos(&e), Some((1, 1)));
        assert!(e.view().last_action.is_none());

        e.go_to_step(99).unwrap();
        assert_eq!(e.step(), 2);
        assert_eq!(maze_pos(&e), Some((3, 1)));
        assert_eq!(e.view().last_action, Some(&Action::step()));

        // Resume from the end settles
        e.run().unwrap();
        assert_eq!(e.drive().unwrap(), RunStatus::Won);
    }

    #[test]
    fn test_compile_error_leaves_idle() {
        let mut calls = 0;
        let compiler = move || -> Result<CompiledProgram, CompileError> {
            calls += 1;
            if calls == 1 {
                Ok(CompiledProgram::from_actions(vec![Action::step()]))
            } else {
                Err(CompileError::at_block("unknown block", "b3"))
            }
        };
        let mut e = SimulationEngine::new(
            &EnvironmentRegistry::builtin(),
            corridor(),
            Box::new(compiler),
            VirtualClock::new(),
        )
        .unwrap();

        e.run().unwrap();
        e.drive().unwrap();

        let err = e.run().unwrap_err();
        assert!(matches!(err, EngineError::Compile(ref c) if c.block_id.as_deref() == Some("b3")));
        assert_eq!(e.status(), RunStatus::Idle);
        assert!(e.state().is_none());
        assert_eq!(e.total_steps(), 1);
    }

    #[test]
    fn test_fault_settles_paused() {
        let level = LevelConfig {
            mode: GameMode::Maze,
            ..Default::default()
        };
        let mut e = engine(level, vec![Action::step()]);
        let err = e.run().unwrap_err();
        match err {
            EngineError::Fault(fault) => {
                assert_eq!(fault.step, 0);
                assert_eq!(fault.fault.kind, FaultKind::MissingConfig("grid"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(e.status(), RunStatus::Paused);
        assert_eq!(e.scheduler().pending_count(), 0);
        let events = e.drain_events();
        assert!(matches!(events.last(), Some(EngineEvent::Faulted { step: 0, .. })));
    }

    #[test]
    fn test_setup_errors() {
        let empty = EnvironmentRegistry::new();
        let err = SimulationEngine::new(
            &empty,
            corridor(),
            Box::new(StaticProgram::default()),
            VirtualClock::new(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::UnsupportedMode(GameMode::Maze));

        let broken = LevelConfig {
            mode: GameMode::Maze,
            solution: vec![Action::step()],
            ..Default::default()
        };
        let err = SimulationEngine::new(
            &EnvironmentRegistry::builtin(),
            broken,
            Box::new(StaticProgram::default()),
            VirtualClock::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Setup(_)));
    }

    #[test]
    fn test_turtle_graded_against_solution() {
        let level = LevelConfig {
            id: "line".into(),
            mode: GameMode::Turtle,
            solution: vec![Action::forward(100.0)],
            ..Default::default()
        };
        let mut e = engine(level.clone(), vec![Action::forward(100.0)]);
        e.run().unwrap();
        assert_eq!(e.drive().unwrap(), RunStatus::Won);
        assert!(e.view().reference.is_some());

        let mut blank = engine(level, vec![Action::pen(crate::sim::PenState::Up)]);
        blank.run().unwrap();
        assert_eq!(blank.drive().unwrap(), RunStatus::Failed);
    }

    #[test]
    fn test_events_sequence() {
        let mut e = engine(corridor(), vec![Action::step(), Action::step()]);
        e.run().unwrap();
        e.drive().unwrap();
        let events = e.drain_events();
        assert_eq!(events[0], EngineEvent::Reset);
        assert_eq!(events[1], EngineEvent::Started { total_steps: 2 });
        assert_eq!(events[2], EngineEvent::Stepped { step: 1, action: 0 });
        assert_eq!(events[3], EngineEvent::Stepped { step: 2, action: 1 });
        assert!(matches!(events[4], EngineEvent::Settled { ref outcome } if outcome.status == RunStatus::Won));
        assert!(e.drain_events().is_empty());
    }

    #[test]
    fn test_view_serializes() {
        let mut e = engine(corridor(), vec![Action::step().with_id("b1"), Action::step()]);
        e.step_forward().unwrap();
        let json = serde_json::to_value(e.view()).unwrap();
        assert_eq!(json["step"], 1);
        assert_eq!(json["totalSteps"], 2);
        assert_eq!(json["status"], "PAUSED");
        assert_eq!(json["lastAction"]["id"], "b1");
        assert_eq!(json["state"]["x"], 2);
    }

    /// Step through the whole program, then check every prefix rebuilds the
    /// state seen live.
    fn assert_stepping_matches_travel(level: LevelConfig, actions: Vec<Action>) {
        let total = actions.len();
        let mut e = engine(level, actions);
        let mut live = Vec::new();
        for _ in 0..total {
            e.step_forward().unwrap();
            live.push(e.state().cloned());
        }
        assert_eq!(e.step(), total);

        for (i, state) in live.iter().enumerate().rev() {
            e.go_to_step(i + 1).unwrap();
            assert!(state.is_some(), "no state after step {}", i + 1);
            assert_eq!(e.state(), state.as_ref(), "diverged at step {}", i + 1);
        }
    }

    #[test]
    fn test_leading_scan_has_initial_state() {
        let mut e = engine(corridor(), vec![Action::scan(), Action::step()]);
        e.step_forward().unwrap();
        assert_eq!(e.step(), 1);
        let live = e.state().cloned();
        assert_eq!(maze_pos(&e), Some((1, 1)));

        e.go_to_step(1).unwrap();
        assert_eq!(e.state().cloned(), live);

        e.step_forward().unwrap();
        assert_eq!(maze_pos(&e), Some((2, 1)));
    }

    #[test]
    fn test_maze_stepping_matches_travel() {
        let actions = vec![
            Action::scan(),
            Action::turn_left(),
            Action::turn_right(),
            Action::step(),
            Action::scan(),
        ];
        assert_stepping_matches_travel(corridor(), actions);
    }

    #[test]
    fn test_turtle_stepping_matches_travel() {
        let level = LevelConfig {
            mode: GameMode::Turtle,
            ..Default::default()
        };
        let actions = vec![
            Action::scan(),
            Action::forward(40.0),
            Action::turn(90.0),
            Action::pen(crate::sim::PenState::Up),
            Action::forward(25.0),
            Action::color("#ff0000"),
            Action::pen(crate::sim::PenState::Down),
            Action::turn_left(),
            Action::forward(10.0),
        ];
        assert_stepping_matches_travel(level, actions);
    }

    #[test]
    fn test_memory_stepping_matches_travel() {
        let mut level = LevelConfig {
            mode: GameMode::Math,
            locked_vars: vec!["x".into()],
            ..Default::default()
        };
        level.inputs.insert("x".into(), crate::sim::Value::Number(3.0));
        let actions = vec![
            Action::scan(),
            Action::set("y", 4.0),
            Action::set("x", 9.0),
            Action::print("hello"),
            Action::set("y", "four"),
        ];
        assert_stepping_matches_travel(level, actions);
    }

    #[test]
    fn test_equation_stepping_matches_travel() {
        let level = LevelConfig {
            mode: GameMode::Equation,
            equation: Some(EquationSpec {
                lhs: "2x + 3".into(),
                rhs: "7".into(),
                variable: "x".into(),
                sign: "=".into(),
                implicit: true,
            }),
            ..Default::default()
        };
        let actions = vec![
            Action::scan(),
            Action::op_both(Operator::Subtract, "3"),
            Action::op_both(Operator::Divide, "0"),
            Action::op_both(Operator::Multiply, "2"),
            Action::op_both(Operator::Add, "x"),
        ];
        assert_stepping_matches_travel(level, actions);
    }

    fn turtle_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            (1.0f64..60.0).prop_map(Action::forward),
            (-180.0f64..180.0).prop_map(Action::turn),
            Just(Action::turn_left()),
            Just(Action::pen(crate::sim::PenState::Up)),
            Just(Action::pen(crate::sim::PenState::Down)),
            Just(Action::scan()),
        ]
    }

    proptest! {
        #[test]
        fn prop_stepping_matches_time_travel(
            actions in prop::collection::vec(turtle_action(), 1..24),
            split in 0usize..24,
        ) {
            let level = LevelConfig { mode: GameMode::Turtle, ..Default::default() };
            let total = actions.len();
            let split = split.min(total);
            let mut e = engine(level.clone(), actions.clone());

            // Jump to `split`, then step the rest one at a time
            e.step_forward().unwrap();
            e.go_to_step(split).unwrap();
            while e.step() < total {
                e.step_forward().unwrap();
            }
            let stepped = e.state().cloned();

            let env = crate::sim::TurtleEnv;
            let folded = replay(&env, &level, &actions).unwrap();
            prop_assert_eq!(stepped, Some(folded.clone()));

            e.go_to_step(total).unwrap();
            prop_assert_eq!(e.state(), Some(&folded));

            // Auto-play lands on the same state
            let mut auto = engine(level, actions);
            auto.run().unwrap();
            auto.drive().unwrap();
            prop_assert_eq!(auto.state(), Some(&folded));
        }

        #[test]
        fn prop_go_to_step_is_idempotent(
            actions in prop::collection::vec(turtle_action(), 0..16),
            n in 0usize..16,
        ) {
            let level = LevelConfig { mode: GameMode::Turtle, ..Default::default() };
            let mut e = engine(level, actions);
            e.step_forward().unwrap();
            e.go_to_step(n).unwrap();
            let first = e.state().cloned();
            e.go_to_step(n).unwrap();
            prop_assert_eq!(e.state().cloned(), first);
        }
    }
}
