//! Constraint-aware resolution engine.
//!
//! Turns raw signals plus compiled constraints into a
//! [`ResolutionArtifact`]: filter, accumulate weighted mass, compute
//! integer shares, clamp to the whale ceiling, then run five
//! independent post-hoc compliance checks. Any check failure aborts the
//! resolution; nothing partial is ever returned.
//!
//! The engine is pure: identical `(constraints, inputs)` always produce
//! the identical `output_hash`. Callers prove it by running the engine
//! twice and comparing — a divergence is fatal to the activation
//! attempt and must never be sealed.
//!
//! [`ResolutionArtifact`]: crate::artifact::ResolutionArtifact

mod checks;
mod engine;

pub use checks::ComplianceCheck;
pub use engine::{ResolutionEngine, ResolutionInputs, ResolveError, RESOLUTION_INPUT_DOMAIN,
    RESOLUTION_OUTPUT_DOMAIN};
