use serde::{Deserialize, Serialize};

// ── Errors ───────────────────────────────────────────────────────────────

/// Why a patch could not be aligned.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignError {
    /// The pattern does not fit inside one of the images.
    OutOfBounds,
    /// The normal equations are (near) singular: too little texture.
    SingularSystem { determinant: f64 },
    /// Refinement did not converge within the iteration budget.
    NoConvergence { iterations: usize },
    /// The aligned patches do not look alike.
    LowCorrelation { correlation: f64, minimum: f64 },
    /// Option values out of range.
    InvalidOptions(String),
    /// Failure at one pyramid level (0 = full resolution).
    Level { level: usize, source: Box<AlignError> },
}

impl std::fmt::Display for AlignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "pattern falls outside the image"),
            Self::SingularSystem { determinant } => {
                write!(f, "singular alignment system (det = {:.3e})", determinant)
            }
            Self::NoConvergence { iterations } => {
                write!(f, "no convergence after {} iterations", iterations)
            }
            Self::LowCorrelation {
                correlation,
                minimum,
            } => write!(
                f,
                "correlation {:.4} below minimum {:.4}",
                correlation, minimum
            ),
            Self::InvalidOptions(msg) => write!(f, "invalid options: {}", msg),
            Self::Level { level, source } => write!(f, "pyramid level {}: {}", level, source),
        }
    }
}

impl std::error::Error for AlignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Level { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl AlignError {
    /// The innermost error, skipping pyramid-level wrappers.
    pub fn root(&self) -> &AlignError {
        match self {
            Self::Level { source, .. } => source.root(),
            other => other,
        }
    }
}

// ── Options ──────────────────────────────────────────────────────────────

/// Which alignment strategy `track_region` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerMode {
    /// Exhaustive integer SSD search only.
    Brute,
    /// Coarse-to-fine gradient refinement from the given guess.
    Gradient,
    /// Brute search, then gradient refinement seeded from it.
    Hybrid,
}

/// Parameters for [`super::track_region`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRegionOptions {
    pub mode: TrackerMode,
    /// Pattern is `(2 * half_pattern_size + 1)²` pixels.
    pub half_pattern_size: usize,
    /// Limit of the brute search around the guess; `None` searches the whole
    /// image.
    pub half_search_size: Option<usize>,
    /// Pyramid levels used by gradient refinement (1 = full resolution only).
    pub pyramid_levels: usize,
    /// Refinement iterations per pyramid level.
    pub max_iterations: usize,
    /// Convergence threshold on the update length, in pixels.
    pub tolerance: f64,
    /// Smallest accepted determinant of the 2×2 normal matrix.
    pub min_determinant: f64,
    /// Smallest accepted normalized cross-correlation of the final match.
    pub minimum_correlation: f64,
    /// Blur applied before taking derivatives.
    pub sigma: f32,
    /// Largest accepted distance between brute and refined positions in
    /// hybrid mode.
    pub max_refinement_shift: f64,
}

impl Default for TrackRegionOptions {
    fn default() -> Self {
        Self {
            mode: TrackerMode::Hybrid,
            half_pattern_size: 5,
            half_search_size: None,
            pyramid_levels: 2,
            max_iterations: 100,
            tolerance: 1e-3,
            min_determinant: 1e-4,
            minimum_correlation: 0.75,
            sigma: 0.9,
            max_refinement_shift: 2.0,
        }
    }
}

impl TrackRegionOptions {
    pub fn validate(&self) -> Result<(), AlignError> {
        let fail = |msg: &str| Err(AlignError::InvalidOptions(msg.to_string()));
        if self.half_pattern_size == 0 {
            return fail("half_pattern_size must be positive");
        }
        if self.pyramid_levels == 0 {
            return fail("pyramid_levels must be at least 1");
        }
        if self.max_iterations == 0 {
            return fail("max_iterations must be positive");
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return fail("tolerance must be positive");
        }
        if !(self.min_determinant.is_finite() && self.min_determinant >= 0.0) {
            return fail("min_determinant must be non-negative");
        }
        if !(-1.0..=1.0).contains(&self.minimum_correlation) {
            return fail("minimum_correlation must lie in [-1, 1]");
        }
        if !(self.sigma.is_finite() && self.sigma >= 0.0) {
            return fail("sigma must be non-negative");
        }
        if !(self.max_refinement_shift.is_finite() && self.max_refinement_shift > 0.0) {
            return fail("max_refinement_shift must be positive");
        }
        Ok(())
    }

    /// Side length of the square pattern.
    pub fn pattern_size(&self) -> usize {
        2 * self.half_pattern_size + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let opts = TrackRegionOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.pattern_size(), 11);
    }

    #[test]
    fn invalid_values_are_reported() {
        let opts = TrackRegionOptions {
            pyramid_levels: 0,
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(AlignError::InvalidOptions(_))));
        let opts = TrackRegionOptions {
            minimum_correlation: 1.5,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let opts: TrackRegionOptions =
            serde_json::from_str(r#"{"mode": "gradient", "half_pattern_size": 8}"#).unwrap();
        assert_eq!(opts.mode, TrackerMode::Gradient);
        assert_eq!(opts.half_pattern_size, 8);
        assert_eq!(opts.pyramid_levels, 2);
    }

    #[test]
    fn level_errors_expose_root_cause() {
        let err = AlignError::Level {
            level: 1,
            source: Box::new(AlignError::OutOfBounds),
        };
        assert_eq!(err.root(), &AlignError::OutOfBounds);
        assert_eq!(err.to_string(), "pyramid level 1: pattern falls outside the image");
    }
}
