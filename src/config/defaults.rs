//! Default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Estimation
// ============================================================================

/// Lower bound on the treatment density before the threshold rule applies.
pub const PS_LOWERBOUND: f64 = 1e-8;

/// Numerator of the sample-adaptive truncation floor `c / (sqrt(n) ln(n / c))`.
pub const SAMPLE_ADAPTIVE_CONSTANT: f64 = 5.0;

/// Share of plateaued observations above which a warning is logged.
pub const TRUNCATION_WARN_FRACTION: f64 = 0.05;

/// Default verbosity: 0 silences per-estimand milestones.
pub const VERBOSITY: u8 = 1;

// ============================================================================
// GLM / Fluctuation
// ============================================================================

/// IRLS iteration cap.
pub const GLM_MAX_ITERATIONS: usize = 100;

/// Relative deviance change at which IRLS stops.
pub const GLM_TOLERANCE: f64 = 1e-10;

// ============================================================================
// Simulation
// ============================================================================

pub const SIMULATION_N: usize = 2_000;

pub const SIMULATION_SEED: u64 = 20_240_611;

/// Confounder draws used to integrate the true estimand value.
///
/// 400 000 draws keep the Monte Carlo error around 1e-3.
pub const TRUTH_MONTE_CARLO_DRAWS: usize = 400_000;
