use std::ops::{Range, RangeInclusive};

use common::{Color, PatternStep};
use rand::Rng;

use super::Pattern;

/// Number of steps in a generated rainbow
pub const RAINBOW_STEPS: usize = 24;
const RAINBOW_DURATION_MS: u16 = 100;
const RAINBOW_BRIGHTNESS: u8 = 100;

/// Length range of a generated random pattern
pub const RANDOM_STEPS: RangeInclusive<usize> = 8..=17;
const RANDOM_DURATION_MS: Range<u16> = 200..1700;
const RANDOM_BRIGHTNESS: Range<u8> = 50..100;

impl Pattern {
    /// Replace the pattern with an evenly spaced sweep around the hue wheel at
    /// full saturation.
    pub fn generate_rainbow(&mut self) {
        let steps = (0..RAINBOW_STEPS)
            .map(|i| {
                let hue = i as f64 / RAINBOW_STEPS as f64;
                PatternStep::new(
                    Color::from_hsl(hue, 1.0, 0.5),
                    RAINBOW_DURATION_MS,
                    RAINBOW_BRIGHTNESS,
                )
            })
            .collect();

        self.replace(steps);
    }

    /// Replace the pattern with a random number of random steps.
    pub fn generate_random<R: Rng>(&mut self, rng: &mut R) {
        let len = rng.gen_range(RANDOM_STEPS);
        let steps = (0..len)
            .map(|_| {
                PatternStep::new(
                    Color::new(rng.gen(), rng.gen(), rng.gen()),
                    rng.gen_range(RANDOM_DURATION_MS),
                    rng.gen_range(RANDOM_BRIGHTNESS),
                )
            })
            .collect();

        self.replace(steps);
    }
}
