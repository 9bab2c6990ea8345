pub mod autoplay;
pub mod chart;
pub mod chart_store;
pub mod frontend;
pub mod gameplay;
pub mod judgment;
pub mod lane_grid;
pub mod life;
pub mod note;
pub mod parsing;
pub mod scheduler;
pub mod scores;
