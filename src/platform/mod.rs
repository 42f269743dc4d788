//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Timers (the JS host owns `setTimeout`; the engine only records requests)
//! - Logging and panic hooks on web
//! - The `wasm-bindgen` surface

use std::time::Duration;

use serde::Serialize;

use crate::sim::{Scheduler, TimerId};

/// Instruction for the host's timer implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TimerRequest {
    Schedule { id: u64, delay_ms: u64 },
    Cancel { id: u64 },
}

/// Scheduler backed by an external event loop.
///
/// Requests queue up until the host takes them; the host calls back with the
/// id once the delay has elapsed.
#[derive(Debug, Default)]
pub struct HostTimers {
    next_id: u64,
    requests: Vec<TimerRequest>,
}

impl HostTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_requests(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.requests)
    }
}

impl Scheduler for HostTimers {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.requests.push(TimerRequest::Schedule {
            id: self.next_id,
            delay_ms,
        });
        TimerId(self.next_id)
    }

    fn cancel(&mut self, timer: TimerId) {
        self.requests.push(TimerRequest::Cancel { id: timer.0 });
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::prelude::*;

    use super::HostTimers;
    use crate::compiler::{CompiledProgram, StaticProgram};
    use crate::sim::{EnvironmentRegistry, LevelConfig, SimulationEngine, TimerId};

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            return;
        }
        log::info!("Blocklab engine loaded");
    }

    /// Engine handle for the browser UI
    #[wasm_bindgen]
    pub struct WasmEngine {
        engine: SimulationEngine<HostTimers>,
    }

    #[wasm_bindgen]
    impl WasmEngine {
        #[wasm_bindgen(constructor)]
        pub fn new(level_json: &str, program_json: &str) -> Result<WasmEngine, JsError> {
            let level: LevelConfig = serde_json::from_str(level_json)?;
            let program = CompiledProgram::from_json(program_json)?;
            let engine = SimulationEngine::new(
                &EnvironmentRegistry::builtin(),
                level,
                Box::new(StaticProgram::new(program)),
                HostTimers::new(),
            )?;
            Ok(Self { engine })
        }

        /// Replace the program after an edit; clears the timeline
        #[wasm_bindgen(js_name = setProgram)]
        pub fn set_program(&mut self, program_json: &str) -> Result<(), JsError> {
            let program = CompiledProgram::from_json(program_json)?;
            self.engine
                .set_compiler(Box::new(StaticProgram::new(program)));
            Ok(())
        }

        pub fn run(&mut self) -> Result<(), JsError> {
            Ok(self.engine.run()?)
        }

        pub fn pause(&mut self) {
            self.engine.pause();
        }

        #[wasm_bindgen(js_name = stepForward)]
        pub fn step_forward(&mut self) -> Result<(), JsError> {
            Ok(self.engine.step_forward()?)
        }

        pub fn reset(&mut self) {
            self.engine.reset();
        }

        #[wasm_bindgen(js_name = clearSimulation)]
        pub fn clear_simulation(&mut self) {
            self.engine.clear_simulation();
        }

        #[wasm_bindgen(js_name = goToStep)]
        pub fn go_to_step(&mut self, step: u32) -> Result<(), JsError> {
            Ok(self.engine.go_to_step(step as usize)?)
        }

        #[wasm_bindgen(js_name = setSpeed)]
        pub fn set_speed(&mut self, speed: u8) {
            self.engine.set_speed(speed);
        }

        /// Called by the host when a scheduled timer elapses
        pub fn fire(&mut self, id: u32) -> Result<(), JsError> {
            Ok(self.engine.fire(TimerId(u64::from(id)))?)
        }

        /// Current view as JSON
        pub fn view(&self) -> Result<String, JsError> {
            Ok(serde_json::to_string(&self.engine.view())?)
        }

        #[wasm_bindgen(js_name = takeTimerRequests)]
        pub fn take_timer_requests(&mut self) -> Result<String, JsError> {
            let requests = self.engine.scheduler_mut().take_requests();
            Ok(serde_json::to_string(&requests)?)
        }

        #[wasm_bindgen(js_name = drainEvents)]
        pub fn drain_events(&mut self) -> Result<String, JsError> {
            Ok(serde_json::to_string(&self.engine.drain_events())?)
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WasmEngine;
