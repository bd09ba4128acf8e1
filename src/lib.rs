pub mod error;
pub mod config;
pub mod registry;
pub mod stream;
pub mod status;
pub mod caller;
pub mod failover;
pub mod dispatcher;
pub mod selector;
pub mod report;

use serde::{Deserialize, Serialize};

/*

parsearch (Parallel Search):
dispatches one query to many remote "search" model endpoints
(thin variants of an OpenAI-compatible chat completion API),
runs them concurrently with a bounded worker pool, retries each
call across a primary and a backup API base, strips interleaved
<think> markup from streamed output, and merges the successful
answers into a comparative report.

parsearch/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports and shared core types
│   ├── error.rs        # Error enum + failure taxonomy
│   ├── config.rs       # API tiers, failover, dispatch config
│   ├── registry.rs     # Data-driven endpoint table
│   ├── stream.rs       # thinking/answer stream classifier
│   ├── status.rs       # Serialized progress-line sink
│   ├── caller.rs       # One OpenAI-compatible HTTP call
│   ├── failover.rs     # Two-tier retry/failover controller
│   ├── dispatcher.rs   # Bounded concurrent fan-out
│   ├── selector.rs     # Keyword-based endpoint recommender
│   └── report.rs       # Aggregation and report rendering
└── tests/              # Integration and property tests

*/

// Convenience re-exports
pub use error::{Error, FailureKind};
pub use registry::EndpointRegistry;
pub use dispatcher::{Dispatcher, TaskResult, TaskStatus};
pub use report::{AggregatedReport, ReportAggregator};

/// PARSEARCH STRUCTURES:

/// One (base URL, credential) pair representing an API tier.
/// The failover controller consumes tiers in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTarget
{   /// Tier label ("primary" or "backup")
    pub tier: String
  , /// API base URL
    pub base: String
  , /// API key for this tier
    pub key: String
}

/// Immutable descriptor of one callable search endpoint.
/// Created once at registry startup, never mutated, shared
/// read-only across concurrent calls.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig
{   /// Logical key (e.g. "google_deep_research")
    pub key: String
  , /// Human-readable name (e.g. "Google Deep Research")
    pub display_name: String
  , /// Underlying model identifier string
    pub model_id: String
  , /// Short description of the endpoint
    pub description: String
  , /// Sampling temperature
    pub temperature: f32
  , /// Max output tokens per response
    pub max_tokens: usize
  , /// Per-request timeout in seconds
    pub request_timeout_secs: u64
  , /// Tier-ordered API targets (primary, backup)
    pub targets: Vec<ApiTarget>
}

impl EndpointConfig
{   /// Derive a display name from a key
    /// ("deepseek_search" -> "Deepseek Search")
    pub fn title_from_key(key: &str) -> String
    {   key.split('_')
          .map(|word| {
            let mut chars = word.chars();
            match chars.next()
            {   Some(first) => {
                  first.to_uppercase().collect::<String>()
                    + chars.as_str()
                }
              , None => String::new()
            }
          })
          .collect::<Vec<String>>()
          .join(" ")
    }
}
