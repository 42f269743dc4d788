//! Blocklab entry point
//!
//! Native: plays a compiled program against a level headlessly on a virtual
//! clock and prints the outcome. On web the engine is driven through
//! `blocklab::platform::WasmEngine` instead.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::fs;
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use clap::Parser;

    use blocklab::proof::FixedHour;
    use blocklab::sim::{EnvironmentRegistry, LevelConfig, SimulationEngine, VirtualClock};
    use blocklab::{CompiledProgram, Settings, SpeedPreset, StaticProgram};

    /// Replay a compiled block program against a level
    #[derive(Parser)]
    #[command(name = "blocklab")]
    #[command(about = "Headless action-replay runner for block puzzles", long_about = None)]
    #[command(version)]
    pub struct Cli {
        /// Level definition (JSON)
        #[arg(short, long, value_name = "FILE")]
        level: PathBuf,

        /// Compiled program: an action array or `{ "actions", "blockCount" }`
        #[arg(short, long, value_name = "FILE")]
        program: PathBuf,

        /// Playback speed, 0-100
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), conflicts_with = "preset")]
        speed: Option<u8>,

        /// Named speed (slow, normal, fast, instant)
        #[arg(long, value_parser = parse_preset)]
        preset: Option<SpeedPreset>,

        /// Settings file to start from
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// Stop at this step and print the rebuilt view instead of playing
        #[arg(long, value_name = "STEP")]
        goto: Option<usize>,

        /// Print every engine event with its virtual timestamp
        #[arg(long)]
        trace: bool,

        /// Salt completion codes with this hour instead of the local clock
        #[arg(long, value_name = "HOUR", value_parser = clap::value_parser!(u32).range(0..24))]
        hour: Option<u32>,
    }

    fn parse_preset(s: &str) -> Result<SpeedPreset, String> {
        SpeedPreset::from_str(s).ok_or_else(|| format!("unknown preset `{}`", s))
    }

    fn read(path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    impl Cli {
        fn settings(&self) -> Settings {
            let mut settings = match (&self.settings, self.preset) {
                (Some(path), preset) => {
                    let mut loaded = Settings::load(path);
                    if let Some(preset) = preset {
                        loaded.apply_preset(preset);
                    }
                    loaded
                }
                (None, Some(preset)) => Settings::from_preset(preset),
                (None, None) => Settings::default(),
            };
            if let Some(speed) = self.speed {
                settings.speed = speed;
            }
            settings
        }

        pub fn execute(self) -> Result<()> {
            let level: LevelConfig = serde_json::from_str(&read(&self.level)?)
                .with_context(|| format!("parsing level {}", self.level.display()))?;
            let program = CompiledProgram::from_json(&read(&self.program)?)?;
            let settings = self.settings();
            log::info!(
                "Level '{}' ({}), {} actions at speed {}",
                level.id,
                level.mode,
                program.len(),
                settings.speed
            );

            let mut engine = SimulationEngine::new(
                &EnvironmentRegistry::builtin(),
                level,
                Box::new(StaticProgram::new(program)),
                VirtualClock::new(),
            )?
            .with_settings(settings);
            if let Some(hour) = self.hour {
                engine = engine.with_hour_source(Box::new(FixedHour(hour)));
            }

            engine.run()?;

            if let Some(step) = self.goto {
                engine.go_to_step(step)?;
                println!("{}", serde_json::to_string_pretty(&engine.view())?);
                return Ok(());
            }

            self.print_events(&mut engine)?;
            while let Some(timer) = engine.scheduler_mut().pop_next() {
                engine.fire(timer)?;
                self.print_events(&mut engine)?;
            }

            match engine.outcome() {
                Some(outcome) => println!("{}", serde_json::to_string_pretty(outcome)?),
                None => println!("{{\"status\":\"{}\"}}", engine.status().as_str()),
            }
            Ok(())
        }

        fn print_events(&self, engine: &mut SimulationEngine<VirtualClock>) -> Result<()> {
            let events = engine.drain_events();
            if !self.trace {
                return Ok(());
            }
            let at = engine.scheduler().now().as_millis();
            for event in events {
                println!("[{:>6}ms] {}", at, serde_json::to_string(&event)?);
            }
            Ok(())
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use clap::Parser;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    headless::Cli::parse().execute()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::start, this is just to satisfy the compiler
}
