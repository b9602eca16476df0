//! Targeting engine.
//!
//! Query -> indicator table -> clever covariate and offset -> fluctuation
//! -> counterfactual aggregation -> influence curve -> inference.

pub mod aggregator;
pub mod covariate;
pub mod estimators;
pub mod fluctuation;
pub mod indicator;
pub mod inference;
pub mod offset;
pub mod threshold;

pub use aggregator::{Aggregates, CounterfactualInputs, EstimationReport};
pub use covariate::{clever_covariate, CleverCovariate};
pub use estimators::{naive_plugin_estimate, ose, tmle, EstimationOptions, OneStepEstimate, TargetedEstimate};
pub use fluctuation::Fluctuation;
pub use indicator::{indicator_fns, IndicatorTable};
pub use inference::{confidence_interval, pvalue, query_report, standard_error, QueryReport, Tail};
pub use offset::OutcomeModel;
pub use threshold::{resolve_threshold, ThresholdRule};
