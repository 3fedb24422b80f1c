//! Acknowledgment-loss policies.
//!
//! The receiver asks a [`LossPolicy`] once per acknowledgment-worthy DATA
//! packet whether the ACK should be suppressed.  Policies are plain objects
//! handed in by the caller, so tests can pick a deterministic one
//! ([`NeverDrop`], [`AlwaysDrop`], [`DropEveryNth`], [`Scripted`]) and the
//! binary can pick a [`Bernoulli`] draw with a fixed seed or OS entropy.
//!
//! The same trait drives the fault model of [`crate::simulator::Simulator`].

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ConfigError;

/// Decides, one event at a time, whether something is dropped.
pub trait LossPolicy {
    /// `true` when the next event should be dropped.
    fn should_drop(&mut self) -> bool;
}

impl<P: LossPolicy + ?Sized> LossPolicy for Box<P> {
    fn should_drop(&mut self) -> bool {
        (**self).should_drop()
    }
}

/// Never drops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDrop;

impl LossPolicy for NeverDrop {
    fn should_drop(&mut self) -> bool {
        false
    }
}

/// Always drops.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDrop;

impl LossPolicy for AlwaysDrop {
    fn should_drop(&mut self) -> bool {
        true
    }
}

/// Drops the n-th, 2n-th, 3n-th … event.
#[derive(Debug, Clone)]
pub struct DropEveryNth {
    n: u64,
    seen: u64,
}

impl DropEveryNth {
    /// `n = 0` never drops.
    pub fn new(n: u64) -> Self {
        Self { n, seen: 0 }
    }
}

impl LossPolicy for DropEveryNth {
    fn should_drop(&mut self) -> bool {
        if self.n == 0 {
            return false;
        }
        self.seen += 1;
        self.seen % self.n == 0
    }
}

/// Replays a fixed list of decisions, then never drops.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    decisions: VecDeque<bool>,
}

impl Scripted {
    pub fn new(decisions: impl IntoIterator<Item = bool>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
        }
    }
}

impl LossPolicy for Scripted {
    fn should_drop(&mut self) -> bool {
        self.decisions.pop_front().unwrap_or(false)
    }
}

/// Independent drops with a fixed probability.
///
/// Each call draws a uniform sample from `[0, 1)` and drops when it is below
/// `probability`, so `0.0` never drops and `1.0` always does.
#[derive(Debug, Clone)]
pub struct Bernoulli {
    probability: f64,
    rng: StdRng,
}

impl Bernoulli {
    /// Reproducible policy seeded with `seed`.
    pub fn seeded(probability: f64, seed: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            probability: check_probability(probability)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Policy seeded from OS entropy.
    pub fn from_entropy(probability: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            probability: check_probability(probability)?,
            rng: StdRng::from_os_rng(),
        })
    }
}

impl LossPolicy for Bernoulli {
    fn should_drop(&mut self) -> bool {
        self.rng.random::<f64>() < self.probability
    }
}

fn check_probability(p: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ConfigError::Probability(p))
    }
}

/// Bernoulli policy from an optional seed, or a cheaper fixed policy when
/// the probability is exactly 0 or 1.
pub fn policy_for(
    probability: f64,
    seed: Option<u64>,
) -> Result<Box<dyn LossPolicy + Send>, ConfigError> {
    let probability = check_probability(probability)?;
    if probability == 0.0 {
        return Ok(Box::new(NeverDrop));
    }
    if probability == 1.0 {
        return Ok(Box::new(AlwaysDrop));
    }
    let policy = match seed {
        Some(seed) => Bernoulli::seeded(probability, seed)?,
        None => Bernoulli::from_entropy(probability)?,
    };
    Ok(Box::new(policy))
}
