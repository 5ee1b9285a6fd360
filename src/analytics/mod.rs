//! Analytics engine: detectors, policy impact, and projections.

pub mod aggregate;
pub mod anomaly;
pub mod monte_carlo;
pub mod off_peak;
pub mod policy;
pub mod stats;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalyMethod, AnomalyReport};
pub use monte_carlo::{CancelFlag, MonteCarloProjector, SimulationParams, SimulationSummary};
pub use off_peak::{HourlyAlert, OffPeakAudit, OffPeakAuditor};
pub use policy::{CostSavings, Policy, PolicyEffects, PolicyImpact, PolicyImpactCalculator};
