use clap::{Parser, Subcommand};
use drumbeat::config::{self, Config};
use drumbeat::core::audio::SimulatedTransport;
use drumbeat::game::autoplay::Autoplay;
use drumbeat::game::chart_store::ChartStore;
use drumbeat::game::frontend::LogFrontend;
use drumbeat::game::gameplay::{self, RunEvent};
use drumbeat::game::lane_grid::LaneGrid;
use drumbeat::game::note::{ChartNote, Hand, Lane};
use drumbeat::game::scores::RunPhase;
use std::path::PathBuf;

// Extra track time after the last note when a chart has no known length.
const TRAILING_SECONDS: f32 = 2.0;
// Hard stop for simulated runs, in simulated seconds past the track end.
const SIMULATION_GRACE_SECONDS: f32 = 30.0;

#[derive(Parser)]
#[command(name = "drumbeat")]
#[command(about = "Headless driver for the drumbeat rhythm core")]
struct Cli {
    /// Configuration file; created with defaults when missing
    #[arg(long, default_value = config::CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored charts
    List,
    /// Print a chart's notes
    Show { name: String },
    /// Convert a foreign beat chart into a native chart
    Import { name: String },
    /// Write a native chart's notes back into its foreign beat chart
    Patch { name: String },
    /// Append a note to a chart, creating it if needed
    Add {
        name: String,
        #[arg(long)]
        time: f32,
        #[arg(long)]
        row: u8,
        #[arg(long)]
        column: u8,
        #[arg(long, value_parser = parse_hand)]
        hand: Hand,
    },
    /// Remove every note from a chart
    Clear { name: String },
    /// Simulate a run with scripted drumsticks
    Play {
        name: String,
        /// Let every n-th note through (0 hits everything)
        #[arg(long, default_value_t = 0)]
        miss_every: u32,
        /// Simulation frame rate
        #[arg(long, default_value_t = 90.0)]
        fps: f32,
        #[arg(long)]
        invincible: bool,
    },
}

fn parse_hand(s: &str) -> Result<Hand, String> {
    s.parse()
        .map_err(|()| format!("invalid hand '{s}' (expected left or right)"))
}

fn play(
    cfg: Config,
    store: &ChartStore,
    name: &str,
    miss_every: u32,
    fps: f32,
    invincible: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(chart) = store.load(name)? else {
        return Err(format!("no chart named '{name}'").into());
    };
    if !(fps.is_finite() && fps > 0.0) {
        return Err(format!("invalid frame rate {fps}").into());
    }
    let length = chart
        .song_length
        .unwrap_or_else(|| chart.last_timing().unwrap_or(0.0) + TRAILING_SECONDS);

    let mut state = gameplay::init(
        cfg,
        chart,
        LaneGrid::default(),
        Box::new(SimulatedTransport::new(length)),
        Some(Box::new(LogFrontend)),
    );
    gameplay::set_invincible(&mut state, invincible);
    gameplay::start_game(&mut state);

    let autoplay = Autoplay::new(miss_every);
    let dt = 1.0 / fps;
    let limit = length + state.config.timing.song_start_delay + SIMULATION_GRACE_SECONDS;
    let mut outcome = RunEvent::None;
    while state.total_elapsed < limit {
        let sticks = autoplay.sticks(&state.scheduler);
        match gameplay::update(&mut state, dt, &sticks) {
            RunEvent::None | RunEvent::Started => {}
            ended => {
                outcome = ended;
                break;
            }
        }
    }

    let s = &state.scores;
    let result = match (outcome, s.phase) {
        (RunEvent::Completed, _) | (_, RunPhase::Completed) => "complete",
        (RunEvent::Failed, _) | (_, RunPhase::Failed) => "failed",
        _ => "timed out",
    };
    println!(
        "{name}: {result} | score {} | max combo {} | lives {} | x{}",
        s.score, s.max_combo, s.lives, s.multiplier
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config);
    log::set_max_level(cfg.log_level.as_level_filter());
    let store = ChartStore::new(&cfg.charts);

    match cli.command {
        Commands::List => {
            for name in store.list_names()? {
                println!("{name}");
            }
        }
        Commands::Show { name } => {
            let chart = store.load_or_empty(&name)?;
            println!(
                "{} ({} notes, length {})",
                chart.song_name,
                chart.notes.len(),
                chart
                    .song_length
                    .map_or_else(|| "unknown".to_string(), |l| format!("{l:.2}s"))
            );
            for note in &chart.notes {
                println!(
                    "{:>9.3}s  row {} col {}  {:<5}  rot {}",
                    note.timing, note.lane.row, note.lane.column, note.hand, note.approach_rotation
                );
            }
        }
        Commands::Import { name } => {
            let chart = store.import_foreign(&name)?;
            println!("Imported '{name}' with {} notes", chart.notes.len());
        }
        Commands::Patch { name } => {
            let Some(chart) = store.load(&name)? else {
                return Err(format!("no chart named '{name}'").into());
            };
            store.patch_foreign_notes_section(&name, &chart)?;
            println!("Patched {} notes into '{name}'", chart.notes.len());
        }
        Commands::Add {
            name,
            time,
            row,
            column,
            hand,
        } => {
            let lane = Lane::new(row, column)
                .ok_or_else(|| format!("lane (row {row}, column {column}) is outside the grid"))?;
            let chart = store.add_note(&name, ChartNote::new(time, lane, hand))?;
            println!("'{name}' now has {} notes", chart.notes.len());
        }
        Commands::Clear { name } => {
            store.clear_notes(&name)?;
            println!("Cleared '{name}'");
        }
        Commands::Play {
            name,
            miss_every,
            fps,
            invincible,
        } => play(cfg, &store, &name, miss_every, fps, invincible)?,
    }
    Ok(())
}
