//! Hand gesture mouse: webcam hand tracking driving the X11 pointer.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{never, select, tick, unbounded, Receiver};
use hand_gesture_mouse::{
    capture_loop::CaptureLoop,
    config::{Config, EXAMPLE_CONFIG},
    dispatcher::{ActionDispatcher, LogDispatcher, X11Dispatcher},
    gesture::GestureState,
    session::CalibrationOutcome,
    vision::{OpencvCamera, OpencvVision},
};
use log::{debug, error, info, warn};
use std::io::BufRead;
use std::thread;
use std::time::Duration;

/// How often the console polls the capture loop for its latest report
const UI_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Capture period in milliseconds
    #[arg(long)]
    interval: Option<u64>,

    /// Log commands instead of moving the pointer
    #[arg(long)]
    dry_run: bool,

    /// Flip camera frames horizontally
    #[arg(long)]
    mirror: bool,

    /// Fingertip smoothing filter (none, exponential[:alpha], moving_average[:window])
    #[arg(short, long)]
    filter: Option<String>,

    /// Hold time in milliseconds after which a retracted thumb starts a drag
    #[arg(long)]
    drag_ms: Option<u64>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

/// Console command entered by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Calibrate,
    Toggle,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "c" | "calibrate" => Some(Self::Calibrate),
            "s" | "start" | "stop" => Some(Self::Toggle),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::from_file(path).with_context(|| format!("Failed to load config file {path}"))?
        }
        None => Config::default(),
    };

    if let Some(cam) = args.cam {
        config.capture.camera_index = cam;
    }
    if let Some(interval) = args.interval {
        config.capture.frame_interval_ms = interval;
    }
    if args.mirror {
        config.capture.mirror = true;
    }
    if let Some(filter) = &args.filter {
        config.pointer.filter.clone_from(filter);
    }
    if let Some(drag_ms) = args.drag_ms {
        config.gesture.drag_threshold_ms = Some(drag_ms);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn create_dispatcher(config: &Config, dry_run: bool) -> Box<dyn ActionDispatcher> {
    if dry_run {
        info!("Dry run: commands are logged, not injected");
        return Box::new(LogDispatcher::new(config.screen.resolution()));
    }
    match X11Dispatcher::new() {
        Ok(dispatcher) => Box::new(dispatcher),
        Err(e) => {
            warn!("X11 input unavailable ({}), falling back to dry run", e);
            Box::new(LogDispatcher::new(config.screen.resolution()))
        }
    }
}

/// Forward stdin lines to a channel; the channel disconnects on EOF
fn spawn_console_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn console reader")?;
    Ok(rx)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Hand Gesture Mouse");
    let config = load_config(&args)?;
    info!("{}", config.vision.hsv_summary());

    let dispatcher = create_dispatcher(&config, args.dry_run);
    let camera = OpencvCamera::new(&config.capture);
    let vision = OpencvVision::new(config.vision.clone());
    let mut capture = CaptureLoop::new(config, camera, vision, dispatcher);

    if let Err(e) = capture.start() {
        warn!("Capture not started: {}. Press 's' to retry.", e);
    }
    info!("Commands: 'c' calibrate, 's' start/stop, 'q' quit (each followed by Enter)");

    let mut console = spawn_console_reader()?;
    let outcomes = capture.calibration_outcomes();
    let faults = capture.camera_faults();
    let poll = tick(UI_POLL_INTERVAL);
    let mut last_state: Option<GestureState> = None;

    loop {
        let mut console_closed = false;
        select! {
            recv(console) -> line => match line {
                Err(_) => {
                    debug!("Console input closed");
                    console_closed = true;
                }
                Ok(line) => match Command::parse(&line) {
                    Some(Command::Calibrate) => {
                        if !capture.is_running() {
                            warn!("Capture is stopped; calibration will run once it starts");
                        }
                        capture.request_calibration();
                    }
                    Some(Command::Toggle) => {
                        if capture.is_running() {
                            capture.stop();
                            last_state = None;
                        } else if let Err(e) = capture.start() {
                            warn!("Capture not started: {}", e);
                        }
                    }
                    Some(Command::Quit) => break,
                    None => warn!("Unknown command {:?}", line.trim()),
                },
            },
            recv(outcomes) -> outcome => match outcome {
                Ok(CalibrationOutcome::Committed(reference)) => info!(
                    "Calibrated at ({:.0}, {:.0}), scale {:.2}x{:.2}",
                    reference.index_origin.x, reference.index_origin.y, reference.scale.sx, reference.scale.sy
                ),
                Ok(CalibrationOutcome::Rejected(reason)) => warn!("Calibration failed: {}", reason),
                Err(_) => break,
            },
            recv(faults) -> fault => {
                if let Ok(reason) = fault {
                    error!("Capture stopped, camera lost: {}. Press 's' to retry.", reason);
                    last_state = None;
                }
            }
            recv(poll) -> _ => {
                if let Some(report) = capture.latest_report() {
                    if last_state != Some(report.state) {
                        info!("Gesture state: {}", report.state);
                        last_state = Some(report.state);
                    }
                    debug!(
                        "Tick {}: {} command(s) in {:?}",
                        report.tick,
                        report.commands.len(),
                        report.processing_time
                    );
                }
            }
        }
        if console_closed {
            console = never();
        }
    }

    capture.stop();
    info!("Bye");
    Ok(())
}
