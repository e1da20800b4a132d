mod input;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nback_core::{
    now_us, Engine, Modality, NBackConfig, ProgressionPolicy, SessionRunner,
};

use crate::input::input_loop;
use crate::render::{CsvFileExporter, TerminalDisplay, TerminalPresentation};

#[derive(Parser)]
#[command(name = "nback", about = "Adaptive multi-modality n-back trainer")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive session (keys: L = location, C = color, A = audio;
    /// Esc quits)
    Run {
        /// Use the Fixed progression policy instead of Adaptive
        #[arg(long)]
        fixed: bool,
        /// Seed for deterministic stimulus draws
        #[arg(long)]
        seed: Option<u64>,
        /// Output CSV path (defaults to PlayerData_<timestamp>.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a session against a simulated subject
    Demo {
        /// Probability the simulated subject answers an expected match
        #[arg(long, default_value_t = 0.85)]
        skill: f64,
        /// Use the Fixed progression policy instead of Adaptive
        #[arg(long)]
        fixed: bool,
        /// Seed for deterministic stimulus draws and responses
        #[arg(long)]
        seed: Option<u64>,
        /// Output CSV path (defaults to PlayerData_<timestamp>.csv)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Compress all delays for a quick run
        #[arg(long)]
        fast: bool,
    },
    /// Print the default configuration as TOML
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<NBackConfig, nback_core::ConfigError> {
    match path {
        Some(p) => NBackConfig::from_file_with_env(p),
        None => {
            let mut cfg = NBackConfig::default();
            cfg.apply_env_overrides()?;
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

fn build_engine(cfg: NBackConfig, seed: Option<u64>) -> Result<Engine, nback_core::ConfigError> {
    let presentation = Box::new(TerminalPresentation::new(&cfg.stimuli));
    let display = Box::new(TerminalDisplay);
    match seed {
        Some(s) => Engine::seeded(cfg, presentation, display, s),
        None => Engine::new(cfg, presentation, display),
    }
}

fn finalize(engine: &mut Engine, out: Option<PathBuf>) {
    let snapshot = engine.snapshot();
    println!(
        "Final score: {} over {} trials (reached N={})",
        snapshot.score, snapshot.trials_run, snapshot.n
    );
    let mut exporter = CsvFileExporter::new(out);
    engine.export_to(&mut exporter);
    println!("Records: {}", exporter.path().display());
}

async fn run_interactive(
    cfg: NBackConfig,
    seed: Option<u64>,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(cfg, seed)?;

    println!("Press Enter to begin the assessment.");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    let mut runner = SessionRunner::new();
    let keys = runner.start(engine);
    let mut input = tokio::task::spawn_blocking(move || input_loop(keys));

    enum RunOutcome {
        Finished(Option<Engine>),
        InputClosed(bool),
    }

    let outcome = tokio::select! {
        finished = runner.finish() => RunOutcome::Finished(finished),
        quit = &mut input => RunOutcome::InputClosed(quit.unwrap_or(true)),
    };
    match outcome {
        RunOutcome::Finished(finished) => {
            if let Some(mut engine) = finished {
                finalize(&mut engine, out);
            }
            // the input loop sees the closed channel and unwinds on its own
            let _ = input.await;
        }
        RunOutcome::InputClosed(true) => {
            runner.abort();
            println!("Session cancelled.");
        }
        RunOutcome::InputClosed(false) => {
            if let Some(mut engine) = runner.finish().await {
                finalize(&mut engine, out);
            }
        }
    }
    Ok(())
}

/// Drive a session with a simulated subject that answers expected matches
/// with probability `skill` and false-alarms rarely.
async fn run_demo(
    cfg: NBackConfig,
    skill: f64,
    seed: Option<u64>,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    const FALSE_ALARM_P: f64 = 0.05;

    let mut engine = build_engine(cfg, seed)?;
    let timing = engine.config().timing.clone();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };

    engine.begin_session(now_us());
    while !engine.is_terminal() {
        engine.start_trial(now_us())?;
        let presses: Vec<Modality> = match engine.trials().last() {
            Some(trial) => Modality::ALL
                .into_iter()
                .filter(|m| {
                    if trial.expected(*m) {
                        rng.gen_bool(skill)
                    } else {
                        rng.gen_bool(FALSE_ALARM_P)
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        let half = timing.stimulus_duration_ms / 2;
        tokio::time::sleep(Duration::from_millis(half)).await;
        for m in presses {
            engine.handle_key(m, now_us());
        }
        tokio::time::sleep(Duration::from_millis(timing.stimulus_duration_ms - half)).await;
        engine.close_window();

        if timing.delay_between_stimuli_ms > 0 {
            tokio::time::sleep(Duration::from_millis(timing.delay_between_stimuli_ms)).await;
        }

        if engine.at_block_boundary() {
            let decision = engine.finish_block();
            if engine.is_terminal() {
                break;
            }
            if decision.advanced && timing.delay_between_phases_ms > 0 {
                tokio::time::sleep(Duration::from_millis(timing.delay_between_phases_ms)).await;
            }
            engine.announce_phase();
        }
    }

    finalize(&mut engine, out);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_ref())?;

    match cli.cmd {
        Commands::Run { fixed, seed, out } => {
            if fixed {
                cfg.session.policy = ProgressionPolicy::Fixed;
            }
            run_interactive(cfg, seed, out).await?;
        }
        Commands::Demo {
            skill,
            fixed,
            seed,
            out,
            fast,
        } => {
            if fixed {
                cfg.session.policy = ProgressionPolicy::Fixed;
            }
            if fast {
                cfg.timing.stimulus_duration_ms = 40;
                cfg.timing.delay_between_stimuli_ms = 10;
                cfg.timing.delay_between_phases_ms = 10;
            }
            if !(0.0..=1.0).contains(&skill) {
                return Err("--skill must be in [0, 1]".into());
            }
            run_demo(cfg, skill, seed, out).await?;
        }
        Commands::Config => {
            print!("{}", NBackConfig::default().to_toml_string()?);
        }
    }
    Ok(())
}
