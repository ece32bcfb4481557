use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use rlbot_lua_core::lua_rt::LuaAgent;
use rlbot_lua_core::replay::{self, Frame, ReplayHandle};
use rlbot_lua_core::resources::ScriptSet;
use rlbot_lua_core::settings::Settings;
use rlbot_lua_core::synthetic::{self, Counts};
use rlbot_lua_core::logger;
use rlbot_lua_core::types::ControllerTuple;

const USAGE: &str = "usage: rlbot-lua [--settings FILE] [--scripts DIR] [--snapshots FILE] \
                     [--synthetic N] [--index N] [--seed N]";

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().with_context(|| format!("{} needs a value\n{}", flag, USAGE))
}

/// Settings file first, then flags on top.
fn parse_args() -> Result<Settings> {
    let mut args = std::env::args().skip(1);
    let mut settings_path = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("settings.json");
    let mut overrides = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => settings_path = PathBuf::from(next_value(&mut args, &arg)?),
            "--scripts" | "--snapshots" | "--synthetic" | "--index" | "--seed" => {
                let value = next_value(&mut args, &arg)?;
                overrides.push((arg, value));
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unknown argument {}\n{}", other, USAGE),
        }
    }

    let mut settings = Settings::load(&settings_path);
    for (flag, value) in overrides {
        match flag.as_str() {
            "--scripts" => settings.script_dir = PathBuf::from(value),
            "--snapshots" => settings.snapshots = Some(PathBuf::from(value)),
            "--synthetic" => {
                settings.snapshots = None;
                settings.synthetic_ticks = value.parse().context("--synthetic expects a count")?;
            }
            "--index" => settings.index = value.parse().context("--index expects an integer")?,
            "--seed" => settings.seed = value.parse().context("--seed expects an integer")?,
            _ => unreachable!(),
        }
    }
    Ok(settings)
}

fn synthetic_frames(settings: &Settings) -> Vec<Frame> {
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let counts = Counts::default();
    (0..settings.synthetic_ticks)
        .map(|n| {
            let packet = synthetic::packet(&mut rng, &counts);
            let prediction = synthetic::ball_prediction(&mut rng, 6, n as f64 / 120.0);
            Frame { packet, prediction: Some(prediction) }
        })
        .collect()
}

fn main() -> Result<()> {
    let settings = parse_args()?;

    let logs_dir = settings.log_dir.clone().unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("logs")
    });
    logger::init(&logs_dir);
    logger::info("rlbot-lua started");

    let scripts = ScriptSet::from_settings(&settings)?;
    let frames = match &settings.snapshots {
        Some(path) => replay::load_frames(path)?,
        None => synthetic_frames(&settings),
    };
    logger::info(&format!("{} frame(s) to replay", frames.len()));

    let handle = Rc::new(ReplayHandle::new());
    let mut agent = LuaAgent::new(handle.clone(), settings.index, &scripts)?;
    let summary = replay::run(&mut agent, &handle, &frames);
    agent.shutdown();

    for output in &summary.outputs {
        match output {
            Some(out) => {
                let tuple: ControllerTuple = (*out).into();
                println!("{}", serde_json::to_string(&tuple)?);
            }
            None => println!("null"),
        }
    }
    eprintln!(
        "{} tick(s), {} fault(s), {} forecast quer(ies)",
        summary.ticks,
        summary.faults,
        handle.queries()
    );
    Ok(())
}
