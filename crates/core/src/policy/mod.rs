pub mod legacy;

pub use legacy::{normalize, LegacyPricePolicy, PolicyOutcome, Reclassification};
