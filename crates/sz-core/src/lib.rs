//! sz-core: stable foundation for the color-measurement sync engine.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - normalize (raw L*a*b*/RGB <-> normalized 0-1 coordinate space)
//! - source (channel vs color-analysis classification)
//! - ids (record ids, measurement identities, DataID derivation)
//! - naming (sample-set name standardisation)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod naming;
pub mod normalize;
pub mod numeric;
pub mod source;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use naming::{standardize_name, SampleSetName};
pub use normalize::*;
pub use numeric::*;
pub use source::{detect_source_type, project_sample, ColorSample, Projection, SourceType};
