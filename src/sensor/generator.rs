use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::params::EmitMode;
use super::Channel;
use crate::error::SensorResult;

/// Round half-to-even at `places` decimals; `0` rounds to a whole number.
///
/// Values too large to scale are returned as-is; at that magnitude an f64
/// carries no fractional digits anyway.
pub fn round_to(value: f64, places: u32) -> f64 {
    if places == 0 {
        return value.round_ties_even();
    }
    let scale = 10f64.powi(places as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round_ties_even() / scale
}

/// One autocorrelated step: blend the previous value with a fresh draw.
///
/// Written as `draw + fraction * (previous - draw)` so equal inputs come back
/// unchanged and nothing overflows near the ends of the f64 range.
pub fn correlated_step(previous: f64, draw: f64, fraction: f64, decimal_places: u32) -> f64 {
    round_to(draw + fraction * (previous - draw), decimal_places)
}

/// Value source for a single channel.
///
/// Owns the channel's random stream (seeded from its id) and running value;
/// nothing else reads or writes them.
pub struct SignalGenerator {
    channel: Channel,
    rng: StdRng,
    current: f64,
    steps: u64,
}

impl SignalGenerator {
    /// Validates the channel's parameters before the first step.
    pub fn new(channel: Channel) -> SensorResult<Self> {
        channel.params.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(channel.id as u64),
            current: channel.params.midpoint(),
            steps: 0,
            channel,
        })
    }

    /// Draw, blend, store and return the next value.
    pub fn next_value(&mut self) -> f64 {
        let draw = self.draw();
        self.apply_draw(draw)
    }

    /// Advance using an externally supplied draw instead of the random stream.
    pub fn apply_draw(&mut self, draw: f64) -> f64 {
        let p = &self.channel.params;
        self.current = correlated_step(self.current, draw, p.fraction, p.decimal_places);
        self.steps += 1;
        self.current
    }

    /// Whole number from `[low, high)`. Falls back to a real-valued draw when
    /// no whole number fits in the range.
    fn draw(&mut self) -> f64 {
        let p = &self.channel.params;
        if p.is_constant() {
            // Binary outputs
            return p.low;
        }
        let (lo, hi) = (p.low.ceil() as i64, p.high.ceil() as i64);
        if lo < hi {
            self.rng.gen_range(lo..hi) as f64
        } else {
            self.rng.gen_range(p.low..p.high)
        }
    }

    pub fn current_value(&self) -> f64 {
        self.current
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn mode(&self) -> EmitMode {
        self.channel.params.mode()
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}
