//! Target point sequencing.
//!
//! Turns normalized target positions into screen pixels and assigns each
//! target a left/right cue. The cue order is shuffled with a fixed seed so the
//! same point count always yields the same cues, run after run.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Seed for the cue order of calibration targets
pub const CALIBRATION_CUE_SEED: u64 = 2024;

/// Seed for the cue order of validation targets
pub const VALIDATION_CUE_SEED: u64 = 912;

/// Direction hint shown next to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cue {
    Left,
    Right,
}

impl Cue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cue::Left => "left",
            Cue::Right => "right",
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cue {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Cue::Left),
            "right" => Ok(Cue::Right),
            other => Err(ConfigError::InvalidCue(other.to_string())),
        }
    }
}

/// Screen-space target with its cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub x: i32,
    pub y: i32,
    pub cue: Cue,
}

/// Ordered targets for one calibration or validation run.
///
/// Immutable once generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSequence {
    targets: Vec<Target>,
}

/// Convert a normalized coordinate pair to pixels, `round(n * dimension)`
pub fn to_pixels(point: (f64, f64), screen: (u32, u32)) -> (i32, i32) {
    (
        (point.0 * f64::from(screen.0)).round() as i32,
        (point.1 * f64::from(screen.1)).round() as i32,
    )
}

/// Shuffled cues for `count` targets: `count / 2` left, the rest right
pub fn shuffled_cues(count: usize, seed: u64) -> Vec<Cue> {
    let lefts = count / 2;
    let mut cues: Vec<Cue> = std::iter::repeat(Cue::Left)
        .take(lefts)
        .chain(std::iter::repeat(Cue::Right).take(count - lefts))
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    cues.shuffle(&mut rng);
    cues
}

/// Reject anything that is not a finite coordinate in `[0, 1]`
pub fn validate_normalized(points: &[(f64, f64)]) -> ConfigResult<()> {
    for (index, &(x, y)) in points.iter().enumerate() {
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_range(x) || !in_range(y) {
            return Err(ConfigError::CoordinateOutOfRange { index, x, y });
        }
    }
    Ok(())
}

impl TargetSequence {
    /// Build the sequence for `points` on a `screen` of the given pixel size
    pub fn generate(points: &[(f64, f64)], screen: (u32, u32), seed: u64) -> ConfigResult<Self> {
        if screen.0 == 0 || screen.1 == 0 {
            return Err(ConfigError::InvalidScreen(format!(
                "{}x{} has a zero dimension",
                screen.0, screen.1
            )));
        }
        validate_normalized(points)?;

        let cues = shuffled_cues(points.len(), seed);
        let targets = points
            .iter()
            .zip(cues)
            .map(|(&point, cue)| {
                let (x, y) = to_pixels(point, screen);
                Target { x, y, cue }
            })
            .collect();
        Ok(Self { targets })
    }

    /// Calibration targets, cues drawn with [`CALIBRATION_CUE_SEED`]
    pub fn calibration(points: &[(f64, f64)], screen: (u32, u32)) -> ConfigResult<Self> {
        Self::generate(points, screen, CALIBRATION_CUE_SEED)
    }

    /// Validation targets, cues drawn with [`VALIDATION_CUE_SEED`]
    pub fn validation(points: &[(f64, f64)], screen: (u32, u32)) -> ConfigResult<Self> {
        Self::generate(points, screen, VALIDATION_CUE_SEED)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.targets.get(index)
    }

    /// Target for the n-th distinct point, wrapping around the sequence
    pub fn cycled(&self, index: usize) -> Option<&Target> {
        if self.targets.is_empty() {
            None
        } else {
            self.targets.get(index % self.targets.len())
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.targets.iter().map(|t| t.cue).collect()
    }
}
