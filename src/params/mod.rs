//! Protocol parameter cache and derived values

pub mod cache;
pub mod unstaking;

pub use cache::GlobalParamsCache;
pub use unstaking::{
    UnstakingPeriodResolver, FALLBACK_NON_PRODUCTION_MS, FALLBACK_PRODUCTION_MS,
};
