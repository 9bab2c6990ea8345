use crate::config::ChartConfig;
use crate::game::chart::Chart;
use crate::game::note::ChartNote;
use crate::game::parsing::beatmap::{self, BeatmapError};
use log::{error, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const NATIVE_EXTENSION: &str = "json";
pub const FOREIGN_EXTENSION: &str = "dat";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("I/O error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("could not decode chart {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("malformed chart {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("chart {path:?} is missing section marker {marker}")]
    MissingSection { path: PathBuf, marker: &'static str },
    #[error("invalid chart name {0:?}")]
    InvalidName(String),
}

impl ChartError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn from_beatmap(path: &Path, err: BeatmapError) -> Self {
        let path = path.to_path_buf();
        match err {
            BeatmapError::MissingSection { marker } => Self::MissingSection { path, marker },
            BeatmapError::Json(source) => Self::Json { path, source },
            BeatmapError::InvalidResult(source) => Self::Malformed {
                path,
                reason: source.to_string(),
            },
        }
    }
}

fn validate_name(name: &str) -> Result<(), ChartError> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        Err(ChartError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Replaces `path` in one step so readers never observe a half-written file.
fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), ChartError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).map_err(|e| ChartError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(ChartError::io(path, e));
    }
    Ok(())
}

/// Durable storage for charts, keyed by name.
#[derive(Clone, Debug)]
pub struct ChartStore {
    levels_dir: PathBuf,
    foreign_dir: PathBuf,
    bpm: f32,
}

impl ChartStore {
    pub fn new(cfg: &ChartConfig) -> Self {
        Self {
            levels_dir: cfg.levels_dir.clone(),
            foreign_dir: cfg.foreign_dir.clone(),
            bpm: cfg.import_bpm,
        }
    }

    pub fn levels_dir(&self) -> &Path {
        &self.levels_dir
    }

    pub fn native_path(&self, name: &str) -> Result<PathBuf, ChartError> {
        validate_name(name)?;
        Ok(self.levels_dir.join(format!("{name}.{NATIVE_EXTENSION}")))
    }

    pub fn foreign_path(&self, name: &str) -> Result<PathBuf, ChartError> {
        validate_name(name)?;
        Ok(self.foreign_dir.join(format!("{name}.{FOREIGN_EXTENSION}")))
    }

    /// Writes `chart` under `name`, creating the levels directory if needed.
    /// Notes are written in timing order; identical input yields identical bytes.
    /// A chart that [`load`](Self::load) would reject is refused before any write.
    pub fn save(&self, name: &str, chart: &Chart) -> Result<PathBuf, ChartError> {
        let path = self.native_path(name)?;
        chart.validate().map_err(|reason| ChartError::Malformed {
            path: path.clone(),
            reason,
        })?;
        fs::create_dir_all(&self.levels_dir).map_err(|e| ChartError::io(&self.levels_dir, e))?;

        let sorted;
        let chart = if chart.is_sorted() {
            chart
        } else {
            let mut copy = chart.clone();
            copy.sort_notes();
            sorted = copy;
            &sorted
        };

        let mut json = serde_json::to_string_pretty(chart).map_err(|source| ChartError::Json {
            path: path.clone(),
            source,
        })?;
        json.push('\n');
        write_replacing(&path, json.as_bytes())?;
        info!("Saved chart '{name}' ({} notes) to {:?}", chart.notes.len(), path);
        Ok(path)
    }

    /// `Ok(None)` when no chart exists under `name`.
    pub fn load(&self, name: &str) -> Result<Option<Chart>, ChartError> {
        let path = self.native_path(name)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No existing chart found for '{name}'");
                return Ok(None);
            }
            Err(e) => return Err(ChartError::io(&path, e)),
        };

        let mut chart: Chart = serde_json::from_str(&text).map_err(|source| ChartError::Json {
            path: path.clone(),
            source,
        })?;
        chart.validate().map_err(|reason| ChartError::Malformed {
            path: path.clone(),
            reason,
        })?;
        chart.sort_notes();
        info!("Loaded {} notes for chart '{name}'", chart.notes.len());
        Ok(Some(chart))
    }

    /// Like [`load`](Self::load), but an absent chart becomes an empty one.
    pub fn load_or_empty(&self, name: &str) -> Result<Chart, ChartError> {
        Ok(self.load(name)?.unwrap_or_else(|| Chart::new(name)))
    }

    /// Names of all stored charts, sorted.
    pub fn list_names(&self) -> Result<Vec<String>, ChartError> {
        let read_dir = match fs::read_dir(&self.levels_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ChartError::io(&self.levels_dir, e)),
        };

        let mut names = Vec::new();
        for item in read_dir {
            let path = item.map_err(|e| ChartError::io(&self.levels_dir, e))?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(NATIVE_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads the foreign chart `name`, converts it and persists it natively.
    pub fn import_foreign(&self, name: &str) -> Result<Chart, ChartError> {
        let path = self.foreign_path(name)?;
        let text = fs::read_to_string(&path).map_err(|e| ChartError::io(&path, e))?;
        let parsed = beatmap::parse(&text).map_err(|e| ChartError::from_beatmap(&path, e))?;
        let chart = beatmap::to_chart(name, &parsed, self.bpm);
        info!(
            "Imported {} of {} notes from {:?} at {} BPM",
            chart.notes.len(),
            parsed.notes.len(),
            path,
            self.bpm
        );
        self.save(name, &chart)?;
        Ok(chart)
    }

    /// Rewrites only the `_notes` array of the foreign chart `name` from `chart`.
    /// On any failure the file on disk is left untouched.
    pub fn patch_foreign_notes_section(&self, name: &str, chart: &Chart) -> Result<(), ChartError> {
        let path = self.foreign_path(name)?;
        let text = fs::read_to_string(&path).map_err(|e| ChartError::io(&path, e))?;
        let notes = beatmap::from_chart(chart, self.bpm);
        let patched = beatmap::splice_notes(&text, &notes).map_err(|e| {
            let err = ChartError::from_beatmap(&path, e);
            error!("Refusing to patch {:?}: {err}", path);
            err
        })?;
        write_replacing(&path, patched.as_bytes())?;
        info!("Patched {} notes into {:?}", notes.len(), path);
        Ok(())
    }

    /// Adds a note to the stored chart `name` (created if absent) and saves it.
    pub fn add_note(&self, name: &str, note: ChartNote) -> Result<Chart, ChartError> {
        let mut chart = self.load_or_empty(name)?;
        chart.add_note(note);
        self.save(name, &chart)?;
        Ok(chart)
    }

    pub fn clear_notes(&self, name: &str) -> Result<Chart, ChartError> {
        let mut chart = self.load_or_empty(name)?;
        chart.clear_notes();
        self.save(name, &chart)?;
        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChartError, ChartStore};
    use crate::config::ChartConfig;
    use crate::game::chart::Chart;
    use crate::game::note::{ChartNote, Hand, Lane};
    use glam::Vec3;
    use std::fs;

    fn store(root: &std::path::Path) -> ChartStore {
        ChartStore::new(&ChartConfig {
            levels_dir: root.join("Levels"),
            foreign_dir: root.join("Imports"),
            import_bpm: 120.0,
        })
    }

    fn sample_chart() -> Chart {
        let mut chart = Chart::new("Drum Song");
        chart.song_length = Some(93.25);
        let mut a = ChartNote::new(0.1, Lane::new(3, 4).unwrap(), Hand::Right);
        a.approach_rotation = Vec3::new(12.5, -0.3, 135.0);
        chart.add_note(a);
        chart.add_note(ChartNote::new(0.1, Lane::new(0, 0).unwrap(), Hand::Left));
        chart.add_note(ChartNote::new(7.333_333, Lane::new(2, 1).unwrap(), Hand::Left));
        chart
    }

    #[test]
    fn save_then_load_round_trips_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let chart = sample_chart();
        store.save("drum", &chart).unwrap();
        assert_eq!(store.load("drum").unwrap(), Some(chart));
    }

    #[test]
    fn save_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.save("drum", &sample_chart()).unwrap();
        let first = fs::read(&path).unwrap();
        store.save("drum", &sample_chart()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn missing_chart_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.load("nope").unwrap(), None);
        let empty = store.load_or_empty("nope").unwrap();
        assert!(empty.notes.is_empty());
        assert_eq!(store.list_names().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn corrupt_chart_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(store.levels_dir()).unwrap();
        fs::write(store.native_path("bad").unwrap(), "{ not json").unwrap();
        assert!(matches!(store.load("bad"), Err(ChartError::Json { .. })));
    }

    #[test]
    fn list_names_and_edits() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.add_note("b", ChartNote::new(2.0, Lane::new(1, 1).unwrap(), Hand::Left)).unwrap();
        let chart = store
            .add_note("b", ChartNote::new(1.0, Lane::new(1, 2).unwrap(), Hand::Right))
            .unwrap();
        assert_eq!(chart.notes[0].timing, 1.0);
        store.save("a", &Chart::new("a")).unwrap();
        fs::write(store.levels_dir().join("notes.txt"), "ignored").unwrap();
        assert_eq!(store.list_names().unwrap(), vec!["a".to_string(), "b".to_string()]);

        let cleared = store.clear_notes("b").unwrap();
        assert!(cleared.notes.is_empty());
        assert_eq!(store.load("b").unwrap().unwrap().notes.len(), 0);
    }

    #[test]
    fn invalid_notes_are_refused_and_the_chart_stays_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let lane = Lane::new(0, 0).unwrap();

        let err = store.add_note("x", ChartNote::new(-1.0, lane, Hand::Left)).unwrap_err();
        assert!(matches!(err, ChartError::Malformed { .. }), "got {err:?}");
        assert_eq!(store.load("x").unwrap(), None, "nothing written");

        store.add_note("x", ChartNote::new(1.0, lane, Hand::Left)).unwrap();
        let path = store.native_path("x").unwrap();
        let before = fs::read(&path).unwrap();
        let err = store
            .add_note("x", ChartNote::new(f32::NAN, lane, Hand::Right))
            .unwrap_err();
        assert!(matches!(err, ChartError::Malformed { .. }), "got {err:?}");
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.load("x").unwrap().unwrap().notes.len(), 1);
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(
            store.save("../escape", &Chart::new("x")),
            Err(ChartError::InvalidName(_))
        ));
    }

    #[test]
    fn import_persists_native_chart() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("Imports")).unwrap();
        fs::write(
            store.foreign_path("song").unwrap(),
            r#"{"_customData":{"_time":8},"_notes":[{"_time":2,"_lineIndex":1,"_lineLayer":2,"_type":1,"_cutDirection":0}]}"#,
        )
        .unwrap();

        let chart = store.import_foreign("song").unwrap();
        assert_eq!(chart.notes.len(), 1);
        assert!((chart.notes[0].timing - 1.0).abs() <= 1e-6);
        assert_eq!(chart.song_length, Some(4.0));
        assert_eq!(store.load("song").unwrap(), Some(chart));
    }

    #[test]
    fn malformed_import_leaves_no_native_chart() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("Imports")).unwrap();
        fs::write(store.foreign_path("song").unwrap(), r#"{"_notes": [ {"_time": "#).unwrap();
        assert!(matches!(store.import_foreign("song"), Err(ChartError::Json { .. })));
        assert_eq!(store.load("song").unwrap(), None);
    }

    #[test]
    fn patch_without_markers_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("Imports")).unwrap();
        let path = store.foreign_path("song").unwrap();
        let original = r#"{"_version":"2.0.0","_events":[]}"#;
        fs::write(&path, original).unwrap();

        let err = store.patch_foreign_notes_section("song", &sample_chart()).unwrap_err();
        assert!(matches!(err, ChartError::MissingSection { .. }), "got {err:?}");
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn patch_rewrites_notes_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("Imports")).unwrap();
        let path = store.foreign_path("song").unwrap();
        fs::write(
            &path,
            "{\n  \"_version\": \"2.0.0\",\n  \"_notes\": [],\n  \"_obstacles\": []\n}\n",
        )
        .unwrap();

        let mut chart = Chart::new("song");
        chart.add_note(ChartNote::new(1.5, Lane::new(1, 2).unwrap(), Hand::Left));
        store.patch_foreign_notes_section("song", &chart).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"_version\": \"2.0.0\",\n  \"_notes\": [{"));
        assert!(text.ends_with("}],\n  \"_obstacles\": []\n}\n"));
        assert!(text.contains("\"_time\":3.0"));
    }
}
