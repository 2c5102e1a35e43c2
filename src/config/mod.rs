pub mod schema;

pub use schema::{
    ClassifierConfig, Config, MatchRule, ObservabilityConfig, PolicyCacheConfig, SelectionConfig,
    TraceMode,
};
