use ini::Ini;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_PATH: &str = "drumbeat.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not write config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

/// Where charts live on disk and how foreign charts are converted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub levels_dir: PathBuf,
    pub foreign_dir: PathBuf,
    /// Fixed tempo used for every beats <-> seconds conversion.
    pub import_bpm: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    /// Pre-roll before playback begins after `start`.
    pub song_start_delay: f32,
    /// Seconds a note needs to travel from its spawn point to its lane.
    pub spawn_offset: f32,
    /// Latency compensation; positive values postpone spawning.
    pub spawn_delay: f32,
    pub fade_out_seconds: f32,
    /// Trailing window before the nominal track length that counts as "done".
    pub completion_window: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConfig {
    pub spawn_depth: f32,
    pub death_zone_depth: f32,
    pub death_margin: f32,
    pub overrun_distance: f32,
}

impl FieldConfig {
    /// z below which an unjudged note counts as missed.
    #[inline(always)]
    pub fn death_boundary(&self) -> f32 {
        self.death_zone_depth - self.death_margin
    }

    /// z every note travels towards.
    #[inline(always)]
    pub fn target_depth(&self) -> f32 {
        self.death_zone_depth - self.overrun_distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgeConfig {
    pub note_half_extent: f32,
    pub stick_radius: f32,
    pub haptic_amplitude: f32,
    pub haptic_duration: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifeConfig {
    pub starting_lives: u32,
    pub life_cap: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub charts: ChartConfig,
    pub timing: TimingConfig,
    pub field: FieldConfig,
    pub judge: JudgeConfig,
    pub life: LifeConfig,
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "drumbeat")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("save"))
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            log_level: LogLevel::Info,
            charts: ChartConfig {
                levels_dir: data_dir.join("Levels"),
                foreign_dir: data_dir.join("Imports"),
                import_bpm: 120.0,
            },
            timing: TimingConfig {
                song_start_delay: 3.0,
                spawn_offset: 2.0,
                spawn_delay: 0.0,
                fade_out_seconds: 2.0,
                completion_window: 0.25,
            },
            field: FieldConfig {
                spawn_depth: 30.0,
                death_zone_depth: -2.0,
                death_margin: 1.0,
                overrun_distance: 20.0,
            },
            judge: JudgeConfig {
                note_half_extent: 0.25,
                stick_radius: 0.05,
                haptic_amplitude: 0.5,
                haptic_duration: 0.1,
            },
            life: LifeConfig {
                starting_lives: 5,
                life_cap: 3,
            },
        }
    }
}

// --- File I/O ---

fn to_ini(cfg: &Config) -> Ini {
    let mut conf = Ini::new();
    conf.with_section(Some("Options"))
        .set("LogLevel", cfg.log_level.as_str());
    conf.with_section(Some("Charts"))
        .set("ForeignDir", cfg.charts.foreign_dir.to_string_lossy())
        .set("ImportBpm", cfg.charts.import_bpm.to_string())
        .set("LevelsDir", cfg.charts.levels_dir.to_string_lossy());
    conf.with_section(Some("Timing"))
        .set("CompletionWindow", cfg.timing.completion_window.to_string())
        .set("FadeOutSeconds", cfg.timing.fade_out_seconds.to_string())
        .set("SongStartDelay", cfg.timing.song_start_delay.to_string())
        .set("SpawnDelay", cfg.timing.spawn_delay.to_string())
        .set("SpawnOffset", cfg.timing.spawn_offset.to_string());
    conf.with_section(Some("Field"))
        .set("DeathMargin", cfg.field.death_margin.to_string())
        .set("DeathZoneDepth", cfg.field.death_zone_depth.to_string())
        .set("OverrunDistance", cfg.field.overrun_distance.to_string())
        .set("SpawnDepth", cfg.field.spawn_depth.to_string());
    conf.with_section(Some("Judge"))
        .set("HapticAmplitude", cfg.judge.haptic_amplitude.to_string())
        .set("HapticDuration", cfg.judge.haptic_duration.to_string())
        .set("NoteHalfExtent", cfg.judge.note_half_extent.to_string())
        .set("StickRadius", cfg.judge.stick_radius.to_string());
    conf.with_section(Some("Life"))
        .set("LifeCap", cfg.life.life_cap.to_string())
        .set("StartingLives", cfg.life.starting_lives.to_string());
    conf
}

fn create_default_config_file(path: &Path) -> Result<(), ConfigError> {
    info!("'{}' not found, creating with default values.", path.display());
    to_ini(&Config::default())
        .write_to_file(path)
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_or<T: FromStr + Copy>(conf: &Ini, section: &str, key: &str, default: T) -> T {
    match conf.get_from(Some(section), key) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring invalid value '{raw}' for [{section}] {key}");
            default
        }),
    }
}

fn positive_or(value: f32, default: f32, what: &str) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!("{what} must be positive, got {value}; using {default}");
        default
    }
}

impl Config {
    /// Builds a configuration from INI text, falling back to defaults for
    /// missing or malformed keys.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let conf = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self::from_ini(&conf))
    }

    fn from_ini(conf: &Ini) -> Self {
        let default = Self::default();
        let mut cfg = default.clone();

        cfg.log_level = conf
            .get_from(Some("Options"), "LogLevel")
            .and_then(|v| LogLevel::from_str(v).ok())
            .unwrap_or(default.log_level);

        if let Some(dir) = conf.get_from(Some("Charts"), "LevelsDir") {
            cfg.charts.levels_dir = PathBuf::from(dir.trim());
        }
        if let Some(dir) = conf.get_from(Some("Charts"), "ForeignDir") {
            cfg.charts.foreign_dir = PathBuf::from(dir.trim());
        }
        cfg.charts.import_bpm = positive_or(
            parse_or(conf, "Charts", "ImportBpm", default.charts.import_bpm),
            default.charts.import_bpm,
            "ImportBpm",
        );

        let t = &mut cfg.timing;
        t.song_start_delay =
            parse_or(conf, "Timing", "SongStartDelay", t.song_start_delay).max(0.0);
        t.spawn_offset = positive_or(
            parse_or(conf, "Timing", "SpawnOffset", t.spawn_offset),
            default.timing.spawn_offset,
            "SpawnOffset",
        );
        t.spawn_delay = parse_or(conf, "Timing", "SpawnDelay", t.spawn_delay);
        t.fade_out_seconds =
            parse_or(conf, "Timing", "FadeOutSeconds", t.fade_out_seconds).max(0.0);
        t.completion_window =
            parse_or(conf, "Timing", "CompletionWindow", t.completion_window).max(0.0);

        let f = &mut cfg.field;
        f.spawn_depth = parse_or(conf, "Field", "SpawnDepth", f.spawn_depth);
        f.death_zone_depth = parse_or(conf, "Field", "DeathZoneDepth", f.death_zone_depth);
        f.death_margin = parse_or(conf, "Field", "DeathMargin", f.death_margin);
        f.overrun_distance = parse_or(conf, "Field", "OverrunDistance", f.overrun_distance);

        let j = &mut cfg.judge;
        j.note_half_extent = parse_or(conf, "Judge", "NoteHalfExtent", j.note_half_extent).max(0.0);
        j.stick_radius = parse_or(conf, "Judge", "StickRadius", j.stick_radius).max(0.0);
        j.haptic_amplitude =
            parse_or(conf, "Judge", "HapticAmplitude", j.haptic_amplitude).clamp(0.0, 1.0);
        j.haptic_duration = parse_or(conf, "Judge", "HapticDuration", j.haptic_duration).max(0.0);

        cfg.life.starting_lives = parse_or(conf, "Life", "StartingLives", cfg.life.starting_lives);
        cfg.life.life_cap = parse_or(conf, "Life", "LifeCap", cfg.life.life_cap);

        cfg
    }

    /// Loads `path`, writing a default file first when it does not exist.
    /// Never fails: unreadable files fall back to defaults with a warning.
    pub fn load(path: &Path) -> Self {
        if !path.exists()
            && let Err(e) = create_default_config_file(path)
        {
            warn!("Failed to create default config file: {e}");
        }

        match Ini::load_from_file(path) {
            Ok(conf) => {
                let cfg = Self::from_ini(&conf);
                info!("Loaded configuration from '{}'.", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load '{}': {e}. Using defaults.", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        to_ini(self)
            .write_to_file(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}
