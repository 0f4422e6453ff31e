pub mod analysis;
pub mod conventions;
pub mod cycle_breaker;
pub mod envelope;
pub mod normalize;
pub mod property_ref;
pub mod prune;

pub use normalize::{NormalizeOptions, NormalizeReport, normalize, normalize_with_options};
