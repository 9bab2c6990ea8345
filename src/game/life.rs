//! Life bookkeeping for a run.
//!
//! A run starts above the regeneration cap: lives lost while above the cap can
//! never be earned back, and regeneration only ever refills up to the cap.

pub const DEFAULT_STARTING_LIVES: u32 = 5;
pub const DEFAULT_LIFE_CAP: u32 = 3;

/// Lives after a penalty. Floors at zero.
#[inline(always)]
pub const fn after_loss(lives: u32) -> u32 {
    lives.saturating_sub(1)
}

/// Lives after a reward. Only grows while strictly below `cap`, so a count
/// already above the cap is left alone rather than clamped down.
#[inline(always)]
pub const fn after_gain(lives: u32, cap: u32) -> u32 {
    if lives < cap { lives + 1 } else { lives }
}

#[inline(always)]
pub const fn is_depleted(lives: u32) -> bool {
    lives == 0
}
