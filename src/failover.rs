//! Two-tier retry/failover: primary API first, backup API
//! second, a bounded attempt budget per tier and blocking
//! exponential backoff between attempts.

use std::time::Duration;
use serde_json::Value;
use log::{debug, warn};

use crate::caller::{CallEndpoint, CallOutcome};
use crate::config::FailoverConfig;
use crate::error::FailureKind;
use crate::status::StatusSink;
use crate::EndpointConfig;

/// Retry policy for failed requests
#[derive(Debug, Clone)]
pub struct RetryPolicy
{   /// Attempts per API tier
    pub attempts_per_tier: usize
  , /// Base backoff; doubled per failed attempt
    pub backoff_base: Duration
}

impl RetryPolicy
{   /// Create a new retry policy
    pub fn new(
      attempts_per_tier: usize
    , backoff_base: Duration
    ) -> Self
    {   RetryPolicy
        {   attempts_per_tier
          , backoff_base
        }
    }

    pub fn from_config(config: &FailoverConfig) -> Self
    {   RetryPolicy::new(
          config.attempts_per_tier
        , Duration::from_secs(config.backoff_base_secs)
        )
    }

    /// Backoff after failed attempt number `attempt`
    /// (zero-based): base * 2^attempt. With the default 8s
    /// base that is 8s before attempt 2 and 16s before
    /// attempt 3, deliberately conservative to ride out
    /// shared upstream overload.
    pub fn backoff_for_attempt(
      &self
    , attempt: usize
    ) -> Duration
    {   debug!("Calculating backoff for attempt {}", attempt);
        self.backoff_base * 2u32.pow(attempt as u32)
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::from_config(&FailoverConfig::default())
    }
}

/// Retry/failover controller over any endpoint caller
pub struct FailoverController<C: CallEndpoint>
{   caller: C
  , policy: RetryPolicy
  , sink: StatusSink
}

impl<C: CallEndpoint> FailoverController<C>
{   pub fn new(
      caller: C
    , policy: RetryPolicy
    , sink: StatusSink
    ) -> Self
    {   FailoverController
        {   caller
          , policy
          , sink
        }
    }

    /// Walk the tier-ordered targets: up to the attempt
    /// budget per tier, backoff between attempts, the sole
    /// fast path being a rate-limited failure on the very
    /// first primary attempt (jump straight to backup).
    /// Exhaustion yields None, never an error.
    pub async fn run(
      &self
    , config: &EndpointConfig
    , query: &str
    , streaming: bool
    , suppress_thinking: bool
    ) -> Option<(String, Value)>
    {   let name = &config.display_name;
        let attempts = self.policy.attempts_per_tier;

        for (tier_idx, target)
          in config.targets.iter().enumerate()
        {   if tier_idx > 0
            {   self.sink.line(
                  name
                , "Switched to backup API, retrying..."
                );
            }

            for attempt in 0..attempts
            {   self.sink.line(
                  name
                , format!(
                    "Calling {} API (attempt {}/{}, {} API)"
                  , name
                  , attempt + 1
                  , attempts
                  , target.tier
                  )
                );

                match self.caller.call(
                  config
                , target
                , query
                , streaming
                , suppress_thinking
                ).await
                {   CallOutcome::Success { text, raw, .. } => {
                      return Some((text, raw));
                    }
                  , CallOutcome::Failure {
                      kind, message, ..
                    } => {
                      warn!(
                        "{}: attempt {} on {} failed ({}): {}"
                      , name, attempt + 1, target.tier
                      , kind, message
                      );
                      self.sink.line(
                        name
                      , format!(
                          "API error ({}): {}", kind, message
                        )
                      );

                      if kind == FailureKind::RateLimited
                        && tier_idx == 0
                        && attempt == 0
                      {   self.sink.line(
                            name
                          , "Primary API overloaded, \
                             switching to backup API"
                          );
                          break;
                      }

                      if attempt + 1 < attempts
                      {   let backoff = self.policy
                            .backoff_for_attempt(attempt);
                          self.sink.line(
                            name
                          , format!(
                              "Retrying in {}s... (attempt {}/{})"
                            , backoff.as_secs()
                            , attempt + 2
                            , attempts
                            )
                          );
                          if !backoff.is_zero()
                          {   tokio::time::sleep(backoff)
                                .await;
                          }
                      } else
                      {   self.sink.line(
                            name
                          , format!(
                              "{} API appears temporarily \
                               unavailable"
                            , target.tier
                            )
                          );
                      }
                    }
                }
            }
        }

        self.sink.line(
          name, "All APIs are temporarily unavailable"
        );
        self.sink.line(
          name
        , format!(
            "{} call failed, no usable response", name
          )
        );
        self.sink.line(name, "Possible causes:");
        self.sink.line(name, "1. Server overload");
        self.sink.line(name, "2. Model temporarily unavailable");
        self.sink.line(name, "3. Network connectivity problems");
        self.sink.line(name, "4. API key problems");
        None
    }
}
