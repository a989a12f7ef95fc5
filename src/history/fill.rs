// src/history/fill.rs
//! Bidirectional decayed carry for blank time-series cells.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::table::Cell;

/// Carried values are capped here before decaying.
pub const DECAY_CAP: f64 = 1000.0;
pub const DECAY_MIN: f64 = 0.5;
pub const DECAY_MAX: f64 = 0.9;

/// Source of the multiplicative shrink applied to each carried value.
pub trait DecaySource {
    /// A factor in `[DECAY_MIN, DECAY_MAX)`.
    fn factor(&mut self) -> f64;
}

/// Uniform decay factors drawn from any `rand` generator.
pub struct RandomDecay<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomDecay<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomDecay<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> DecaySource for RandomDecay<R> {
    fn factor(&mut self) -> f64 {
        self.rng.gen_range(DECAY_MIN..DECAY_MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Fill blanks in one column, scanning rows in `direction`.
///
/// A non-blank cell resets the carry to its own value (a `null` clears it and is
/// left alone); a blank after a known value becomes `round(min(carry, cap) * factor)`
/// and that result is the next carry.
pub fn fill_column(
    rows: &mut [Vec<Cell>],
    col: usize,
    direction: Direction,
    decay: &mut dyn DecaySource,
) {
    let order: Box<dyn Iterator<Item = usize>> = match direction {
        Direction::Forward => Box::new(0..rows.len()),
        Direction::Backward => Box::new((0..rows.len()).rev()),
    };

    let mut carry: Option<f64> = None;
    for i in order {
        let cell = &mut rows[i][col];
        if !cell.is_blank() {
            carry = cell.as_f64();
        } else if let Some(prev) = carry {
            let decayed = (prev.min(DECAY_CAP) * decay.factor()).round();
            *cell = Cell::from_f64(decayed);
            carry = Some(decayed);
        }
    }
}

/// Forward pass over every value column, then a backward pass over the result.
/// Column 0 holds the period label and is left alone.
pub fn decay_fill(rows: &mut [Vec<Cell>], decay: &mut dyn DecaySource) {
    let width = rows.first().map_or(0, Vec::len);
    for direction in [Direction::Forward, Direction::Backward] {
        for col in 1..width {
            fill_column(rows, col, direction, decay);
        }
    }
}
