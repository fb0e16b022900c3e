//! Distance metrics. Every metric returns a dissimilarity: lower is closer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::VafError;

/// Largest value the cosine distance can take (two opposite vectors).
pub const MAX_COSINE_DISTANCE: f32 = 2.0;

/// Distance metric bound to an index at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared Euclidean distance. Range: \[0, ∞).
    L2,
    /// `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
}

impl Metric {
    /// Distance between two equal-length vectors.
    ///
    /// Callers validate lengths; the zip stops at the shorter slice.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => squared_euclidean(a, b),
            Metric::Cosine => cosine_distance(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = VafError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" => Ok(Metric::L2),
            "cosine" => Ok(Metric::Cosine),
            other => Err(VafError::InvalidArgument(format!(
                "unsupported metric '{}', must be 'l2' or 'cosine'",
                other
            ))),
        }
    }
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum::<f64>() as f32
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a_sq, mut norm_b_sq) = (0.0f64, 0.0f64, 0.0f64);

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a_sq += x * x;
        norm_b_sq += y * y;
    }

    if norm_a_sq == 0.0 || norm_b_sq == 0.0 {
        return MAX_COSINE_DISTANCE;
    }

    let similarity = dot / (norm_a_sq.sqrt() * norm_b_sq.sqrt());
    let distance = (1.0 - similarity) as f32;
    if distance.is_nan() {
        MAX_COSINE_DISTANCE
    } else {
        distance.clamp(0.0, MAX_COSINE_DISTANCE)
    }
}
