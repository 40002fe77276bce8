//! `pulsesynth`: play demo songs and drum patterns on the default output.

use std::error::Error;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulsesynth_core::config::EngineConfig;
use pulsesynth_core::device::OutputDevice;
use pulsesynth_core::dsp::percussion::Percussion;
use pulsesynth_core::scheduler::{ArpeggioConfig, Scheduler};
use pulsesynth_core::song;
use pulsesynth_core::AudioEngine;

/// How often the control loop wakes to feed the scheduler.
const TICK: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(version, about = "Interactive synth engine player.")]
struct Cli {
    /// Engine config file (JSON, camelCase keys).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Master volume [0, 1].
    #[arg(short, long, default_value_t = 0.8)]
    volume: f64,
    /// Reverb amount [0, 1].
    #[arg(short, long, default_value_t = 0.3)]
    reverb: f64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the bundled demo songs.
    List {},
    /// Plays a bundled demo song, or a song from a JSON file.
    Song {
        /// Demo song id (see `list`).
        id: Option<String>,
        /// Path to a JSON song instead of a demo id.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Plays a drum pattern: space-separated pad names per eighth note,
    /// `-` for a rest. For example "kick hihat snare hihat".
    Drums {
        pattern: String,
        #[arg(short, long, default_value_t = 120.0)]
        bpm: f64,
        /// Times to repeat the pattern.
        #[arg(short, long, default_value_t = 4)]
        loops: usize,
    },
    /// Cycles pitch names through the arpeggiator for a few seconds.
    Arp {
        notes: Vec<String>,
        #[arg(short, long, default_value_t = 4.0)]
        seconds: f64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Commands::List {} = cli.command {
        for song in song::demo_songs()? {
            println!(
                "{:<16} {} {} ({} bpm, {}s)",
                song.id, song.metadata.icon, song.metadata.name, song.metadata.bpm, song.metadata.duration_seconds
            );
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let output = OutputDevice::open(config)?;
    {
        let mut engine = output.lock()?;
        engine.set_master_volume(cli.volume);
        engine.set_reverb_amount(cli.reverb);
    }

    match cli.command {
        Commands::List {} => {}
        Commands::Song { id, file } => {
            let song = match (file, id) {
                (Some(path), _) => song::Song::from_json(&std::fs::read_to_string(path)?)?,
                (None, Some(id)) => song::find_demo(&id)?.ok_or_else(|| format!("no demo song '{id}'"))?,
                (None, None) => return Err("give a demo song id or --file".into()),
            };
            play_song(&output, &song)?;
        }
        Commands::Drums { pattern, bpm, loops } => play_drums(&output, &pattern, bpm, loops)?,
        Commands::Arp { notes, seconds } => play_arpeggio(&output, &notes, seconds)?,
    }

    // let the reverb tail ring out
    thread::sleep(Duration::from_millis(1500));
    Ok(())
}

fn play_song(output: &OutputDevice, song: &song::Song) -> Result<(), Box<dyn Error>> {
    let now = output.lock()?.current_time();
    let mut scheduler: Scheduler<AudioEngine> = Scheduler::starting_at(now);
    let handle = scheduler.play_song(
        song,
        Some(Box::new(|note: &str| info!(note, "note"))),
        None,
    );
    info!(song = %song.id, name = %song.metadata.name, "playing");
    while !handle.is_finished() {
        {
            let mut engine = output.lock()?;
            let now = engine.current_time();
            scheduler.advance_to(now, &mut engine);
        }
        thread::sleep(TICK);
    }
    Ok(())
}

fn play_drums(output: &OutputDevice, pattern: &str, bpm: f64, loops: usize) -> Result<(), Box<dyn Error>> {
    let steps: Vec<Option<Percussion>> = pattern
        .split_whitespace()
        .map(|name| match name {
            "-" | "." => Ok(None),
            name => name.parse().map(Some),
        })
        .collect::<Result<_, _>>()?;
    if steps.is_empty() {
        return Err("empty drum pattern".into());
    }

    let step_seconds = 60.0 / bpm.max(1.0) / 2.0;
    let start = output.lock()?.current_time();
    let total = steps.len() * loops;
    let mut next = 0;
    while next < total {
        {
            let mut engine = output.lock()?;
            let now = engine.current_time();
            while next < total && start + next as f64 * step_seconds <= now {
                if let Some(sound) = steps[next % steps.len()] {
                    engine.trigger_percussion(sound);
                }
                next += 1;
            }
        }
        thread::sleep(TICK);
    }
    Ok(())
}

fn play_arpeggio(output: &OutputDevice, notes: &[String], seconds: f64) -> Result<(), Box<dyn Error>> {
    let names: Vec<&str> = notes.iter().map(String::as_str).collect();
    let now = output.lock()?.current_time();
    let mut scheduler: Scheduler<AudioEngine> = Scheduler::starting_at(now);
    let handle = scheduler.play_arpeggio(&names, ArpeggioConfig::default());
    loop {
        {
            let mut engine = output.lock()?;
            let t = engine.current_time();
            if t >= now + seconds {
                break;
            }
            scheduler.advance_to(t, &mut engine);
        }
        thread::sleep(TICK);
    }
    handle.stop();
    Ok(())
}
