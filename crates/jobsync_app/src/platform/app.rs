use std::env;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use jobsync_core::{update, AppState, Msg};
use jobsync_engine::EngineHandle;
use jobsync_logging::{sync_info, sync_warn};

use super::config::{AppConfig, API_URL_ENV, DEFAULT_CONFIG_PATH};
use super::effects::EffectRunner;
use super::input::{spawn_stdin_reader, InputCommand, HELP};
use super::logging;
use super::persistence::Snapshots;
use super::render::render;

const IDLE_SLEEP: Duration = Duration::from_millis(20);

pub fn run_app() -> anyhow::Result<()> {
    let config_path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let loaded = AppConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => AppConfig::default(),
    };
    config.apply_api_url_override(env::var(API_URL_ENV).ok());

    logging::initialize(config.log_destination);
    match loaded {
        Ok(Some(_)) => sync_info!("app: loaded config from {:?}", config_path),
        Ok(None) => sync_info!("app: no config at {:?}, using defaults", config_path),
        Err(err) => sync_warn!("app: ignoring config: {:#}", err),
    }
    sync_info!("app: api at {}", config.base_url);

    let engine = EngineHandle::new(config.engine_settings()).context("starting engine")?;
    let mut snapshots = Snapshots::open(&config.snapshot_dir);
    let (user, jobs) = snapshots.load();
    let mut runner = EffectRunner::new(engine, snapshots);

    let (input_tx, input_rx) = mpsc::channel();
    spawn_stdin_reader(input_tx);
    println!("{HELP}");

    let mut state = AppState::new(config.sync_settings());
    state = dispatch(state, Msg::Mounted { user, jobs }, &mut runner);

    loop {
        let mut busy = false;

        while let Ok(input) = input_rx.try_recv() {
            busy = true;
            match input {
                Ok(InputCommand::Dispatch(msg)) => state = dispatch(state, msg, &mut runner),
                Ok(InputCommand::Help) => println!("{HELP}"),
                Ok(InputCommand::Quit) => {
                    dispatch(state, Msg::TornDown, &mut runner);
                    sync_info!("app: quit");
                    return Ok(());
                }
                Err(hint) => println!("{hint}\n{HELP}"),
            }
        }

        while let Some(msg) = runner.poll() {
            busy = true;
            state = dispatch(state, msg, &mut runner);
        }

        if !busy {
            thread::sleep(IDLE_SLEEP);
        }
    }
}

fn dispatch(state: AppState, msg: Msg, runner: &mut EffectRunner) -> AppState {
    let (mut state, effects) = update(state, msg);
    runner.enqueue(effects);
    if state.consume_dirty() {
        print!("{}", render(&state.view(), Local::now()));
    }
    state
}
