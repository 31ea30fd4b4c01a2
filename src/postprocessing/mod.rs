//! Post-processing: an effect composer wrapping the scene renderer and the
//! full-screen passes it runs.

pub mod composer;
pub mod pass;
pub mod ssao;

pub use composer::EffectComposer;
pub use pass::{CopyPass, Pass, PassInputs};
pub use ssao::{SsaoOutput, SsaoPass};
