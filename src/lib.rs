//! Core of a drum rhythm game: charts, the song clock, note scheduling, hit
//! judging and scoring. Rendering, device input and audio output are left to
//! the host through [`core::audio::Transport`] and [`game::frontend::Frontend`].

pub mod config;
pub mod core;
pub mod game;
