//! Image based lighting: environment maps derived from HDR panoramas.

pub mod pmrem;

pub use pmrem::{EnvironmentMap, PmremGenerator};
