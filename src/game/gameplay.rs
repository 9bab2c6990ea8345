//! Per-frame orchestration of a run.
//!
//! `update` drives everything in a fixed order each tick: clock, note motion,
//! spawning, hit judging, deadline misses, failure and finally completion.
//! The scoring machine only reacts to the events the scheduler and judge
//! raise; it never touches notes itself.

use crate::config::Config;
use crate::core::audio::Transport;
use crate::core::clock::{ClockEvent, SongClock};
use crate::core::space::{Pose, quat_from_euler_degrees};
use crate::game::chart::Chart;
use crate::game::frontend::{EffectKind, Frontend, SFX_LEVEL_COMPLETE, SFX_POWER_DOWN};
use crate::game::judgment::{HitJudge, JudgeEvent, StickInput};
use crate::game::lane_grid::LaneGrid;
use crate::game::note::Hand;
use crate::game::scheduler::{LiveNote, NoteScheduler};
use crate::game::scores::{RunPhase, ScoreState};
use glam::Vec3;
use log::{debug, info, warn};

// Offsets of the hit effect from the note it replaces.
const HIT_EFFECT_RAISE: f32 = 0.1;
const HIT_EFFECT_PULL_BACK: f32 = 0.25;
const HIT_EFFECT_TILT_DEGREES: f32 = 90.0;

const HEARTBEAT_SECONDS: f32 = 1.0;

/// What a tick changed at the run level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunEvent {
    None,
    Started,
    Failed,
    Completed,
}

pub struct State {
    pub config: Config,
    pub chart: Chart,
    pub clock: SongClock,
    pub scheduler: NoteScheduler,
    pub judge: HitJudge,
    pub scores: ScoreState,
    frontend: Option<Box<dyn Frontend>>,
    pub total_elapsed: f32,
    log_timer: f32,
}

pub fn init(
    config: Config,
    chart: Chart,
    grid: LaneGrid,
    transport: Box<dyn Transport>,
    frontend: Option<Box<dyn Frontend>>,
) -> State {
    info!(
        "Initializing gameplay for '{}' ({} notes)",
        chart.song_name,
        chart.notes.len()
    );
    if frontend.is_none() {
        warn!("No frontend attached; screens, sounds, haptics and effects will be skipped");
    }

    let clock = SongClock::new(transport, config.timing.song_start_delay);
    let mut scheduler = NoteScheduler::new(grid, &config.timing, &config.field);
    scheduler.load(&chart);
    let judge = HitJudge::new(&config.judge);
    let scores = ScoreState::new(config.life);

    State {
        config,
        chart,
        clock,
        scheduler,
        judge,
        scores,
        frontend,
        total_elapsed: 0.0,
        log_timer: 0.0,
    }
}

/// Swaps in a different chart and returns to the run-selection state.
pub fn load_chart(state: &mut State, chart: Chart) {
    state.scheduler.load(&chart);
    state.chart = chart;
    reset(state);
}

#[inline(always)]
fn notify(state: &mut State, f: impl FnOnce(&mut dyn Frontend)) {
    if let Some(frontend) = state.frontend.as_deref_mut() {
        f(frontend);
    }
}

pub fn start_game(state: &mut State) -> bool {
    if state.scores.phase != RunPhase::Idle {
        debug!("Ignoring start request in phase {:?}", state.scores.phase);
        return false;
    }
    state.scores.phase = RunPhase::Running;
    state.clock.start();
    state.log_timer = 0.0;
    info!("Run started: '{}'", state.chart.song_name);
    true
}

/// Clears all run state, stops the song and asks for the run-selection screen.
pub fn reset(state: &mut State) {
    state.scores.reset();
    state.clock.reset();
    state.scheduler.reset();
    state.judge.reset();
    state.log_timer = 0.0;
    notify(state, |f| f.show_run_selection());
    info!("Run reset");
}

pub fn set_invincible(state: &mut State, invincible: bool) {
    state.scores.set_invincible(invincible);
}

/// Seeks the song and resynchronizes the scheduler in the same step, so no
/// stale note outlives the jump.
pub fn seek_relative(state: &mut State, delta: f32) -> Option<f32> {
    let time = state.clock.seek_relative(delta)?;
    state.scheduler.resync_to(time);
    state.judge.clear_contacts();
    Some(time)
}

fn apply_correct_hit(state: &mut State, note: &LiveNote) {
    let position = note.position + Vec3::new(0.0, HIT_EFFECT_RAISE, -HIT_EFFECT_PULL_BACK);
    let rotation =
        note.rotation * quat_from_euler_degrees(Vec3::new(HIT_EFFECT_TILT_DEGREES, 0.0, 0.0));
    notify(state, |f| {
        f.spawn_visual_effect(EffectKind::CircleBoom, Pose::new(position, rotation));
    });
    state.scores.apply_hit();
}

/// Wrong hits and deadline misses: rumble the other hand, then penalize.
fn apply_penalty(state: &mut State, note_hand: Hand) {
    let amplitude = state.config.judge.haptic_amplitude;
    let duration = state.config.judge.haptic_duration;
    notify(state, |f| f.trigger_haptic(note_hand.opposite(), amplitude, duration));
    state.scores.apply_miss();
}

fn fail(state: &mut State) {
    state.clock.sudden_stop();
    notify(state, |f| {
        f.play_sound_effect(SFX_POWER_DOWN);
        f.show_failure();
    });
}

fn complete(state: &mut State) {
    state.scores.phase = RunPhase::Completed;
    state.clock.fade_out(state.config.timing.fade_out_seconds);
    let (score, max_combo) = (state.scores.score, state.scores.max_combo);
    info!("Level complete: score {score}, max combo {max_combo}");
    notify(state, |f| f.show_completion(score, max_combo));
}

pub fn update(state: &mut State, delta_time: f32, sticks: &[StickInput]) -> RunEvent {
    state.total_elapsed += delta_time;
    for input in sticks {
        state.judge.apply_input(input);
    }

    let mut event = RunEvent::None;
    if state.scores.phase == RunPhase::Idle
        && state.judge.check_start_trigger() == Some(JudgeEvent::StartRun)
        && start_game(state)
    {
        event = RunEvent::Started;
    }

    if let Some(ClockEvent::TrackFinished { faded: true }) = state.clock.tick(delta_time) {
        notify(state, |f| f.play_sound_effect(SFX_LEVEL_COMPLETE));
    }

    if !state.scores.is_running() {
        state.judge.end_frame();
        return event;
    }

    let song_time = state.clock.current_time();
    state.scheduler.advance(delta_time);
    if let Some(time) = song_time {
        state.scheduler.spawn_due(time);
    }

    for judged in state.judge.judge(&mut state.scheduler) {
        match judged {
            JudgeEvent::CorrectHit { note } => apply_correct_hit(state, &note),
            JudgeEvent::WrongHit { note, .. } => apply_penalty(state, note.hand),
            JudgeEvent::StartRun => {}
        }
    }
    for note in state.scheduler.take_missed() {
        debug!("Missed {:?} {} note ({:.3}s)", note.id, note.hand, note.timing);
        apply_penalty(state, note.hand);
    }

    if state.scores.check_failure() {
        fail(state);
        return RunEvent::Failed;
    }

    if state.scheduler.check_completion(
        song_time,
        state.clock.has_track_finished(),
        state.clock.track_length(),
    ) {
        complete(state);
        return RunEvent::Completed;
    }

    state.log_timer += delta_time;
    if state.log_timer >= HEARTBEAT_SECONDS {
        info!(
            "Time: {}, Score: {}, Combo: {}, Multiplier: x{}, Lives: {}, Live Notes: {}",
            song_time.map_or_else(|| "-".to_string(), |t| format!("{t:.2}")),
            state.scores.score,
            state.scores.combo,
            state.scores.multiplier,
            state.scores.lives,
            state.scheduler.live_notes().len()
        );
        state.log_timer -= HEARTBEAT_SECONDS;
    }
    event
}
