//! Empowerment routing and calibration for ticket resolutions.
//!
//! [`router`] decides which empowerment tier a submitted resolution
//! lands in and what that tier demands (auto-approve, team-lead
//! approval, or forced calibration). [`calibration`] assembles the
//! deterministic weekly review queue of forced entries plus a seeded
//! random sample.

#![warn(missing_docs)]

pub mod calibration;
pub mod router;

pub use calibration::{
    CalibrationError, CalibrationSampler, ResolutionCandidate, SamplerConfig,
};
pub use router::{EmpowermentRouter, ResolutionError, RouterConfig, RoutingOutcome};
