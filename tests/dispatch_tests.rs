//! Retry/failover and dispatcher invariants, exercised
//! against a scripted caller (no network involved)

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use parsearch::caller::{CallEndpoint, CallOutcome};
use parsearch::config::ApiConfig;
use parsearch::dispatcher::{Dispatcher, TaskStatus};
use parsearch::error::FailureKind;
use parsearch::failover::{FailoverController, RetryPolicy};
use parsearch::registry::EndpointRegistry;
use parsearch::report::ReportAggregator;
use parsearch::status::StatusSink;
use parsearch::{ApiTarget, EndpointConfig};

// ===== Scripted caller =====

/// One scripted behavior for one call
#[derive(Debug, Clone)]
enum Step
{   Succeed(&'static str)
  , Fail(FailureKind, &'static str)
  , Hang(Duration)
}

#[derive(Default)]
struct Inner
{   scripts: Mutex<HashMap<String, VecDeque<Step>>>
  , calls: Mutex<Vec<(String, String)>>
}

/// Caller replaying a per-endpoint script and recording
/// every (endpoint key, tier) it was asked for
#[derive(Clone, Default)]
struct ScriptedCaller
{   inner: Arc<Inner>
}

impl ScriptedCaller
{   fn new() -> Self
    {   ScriptedCaller::default()
    }

    fn script(
      &self
    , key: &str
    , steps: Vec<Step>
    )
    {   self.inner.scripts.lock().unwrap().insert(
          key.to_string()
        , steps.into_iter().collect()
        );
    }

    fn calls(&self) -> Vec<(String, String)>
    {   self.inner.calls.lock().unwrap().clone()
    }

    fn tiers_called(&self, key: &str) -> Vec<String>
    {   self.calls()
          .into_iter()
          .filter(|(k, _)| k == key)
          .map(|(_, tier)| tier)
          .collect()
    }
}

#[async_trait]
impl CallEndpoint for ScriptedCaller
{   async fn call(
      &self
    , config: &EndpointConfig
    , target: &ApiTarget
    , _query: &str
    , _streaming: bool
    , _suppress_thinking: bool
    ) -> CallOutcome
    {   self.inner.calls.lock().unwrap().push((
          config.key.clone()
        , target.tier.clone()
        ));
        let step = self.inner.scripts.lock().unwrap()
          .get_mut(&config.key)
          .and_then(|queue| queue.pop_front());
        match step
        {   Some(Step::Succeed(text)) => {
              CallOutcome::Success
              {   text: text.to_string()
                , raw: Value::Null
                , elapsed: Duration::ZERO
              }
            }
          , Some(Step::Fail(kind, message)) => {
              CallOutcome::Failure
              {   kind
                , message: message.to_string()
                , elapsed: Duration::ZERO
              }
            }
          , Some(Step::Hang(pause)) => {
              tokio::time::sleep(pause).await;
              CallOutcome::Failure
              {   kind: FailureKind::Transient
                , message: "slow call".to_string()
                , elapsed: pause
              }
            }
          , None => {
              CallOutcome::Failure
              {   kind: FailureKind::Fatal
                , message: "script exhausted".to_string()
                , elapsed: Duration::ZERO
              }
            }
        }
    }
}

// ===== Fixtures =====

fn api_config() -> ApiConfig
{   ApiConfig::new(
      "https://primary.example/v1".to_string()
    , "pk".to_string()
    , "https://backup.example/v1".to_string()
    , "bk".to_string()
    )
}

fn endpoint(key: &str) -> EndpointConfig
{   EndpointConfig
    {   key: key.to_string()
      , display_name: EndpointConfig::title_from_key(key)
      , model_id: format!("{}-model", key)
      , description: String::new()
      , temperature: 0.7
      , max_tokens: 1000
      , request_timeout_secs: 30
      , targets: api_config().targets()
    }
}

fn registry_with(keys: &[&str]) -> EndpointRegistry
{   let mut registry
      = EndpointRegistry::empty(&api_config());
    for key in keys
    {   registry.register(endpoint(key));
    }
    registry
}

/// Zero backoff so attempt budgets run instantly
fn fast_policy() -> RetryPolicy
{   RetryPolicy::new(3, Duration::ZERO)
}

fn controller(
  caller: ScriptedCaller
) -> FailoverController<ScriptedCaller>
{   FailoverController::new(
      caller
    , fast_policy()
    , StatusSink::null()
    )
}

fn fatal(message: &'static str) -> Step
{   Step::Fail(FailureKind::Fatal, message)
}

fn transient() -> Step
{   Step::Fail(FailureKind::Transient, "hiccup")
}

fn rate_limited() -> Step
{   Step::Fail(FailureKind::RateLimited, "overloaded")
}

// ===== Retry policy =====

#[test]
fn backoff_schedule_is_conservative_exponential()
{   let policy = RetryPolicy::default();
    assert_eq!(policy.attempts_per_tier, 3);
    assert_eq!(
      policy.backoff_for_attempt(0)
    , Duration::from_secs(8)
    );
    assert_eq!(
      policy.backoff_for_attempt(1)
    , Duration::from_secs(16)
    );
}

// ===== Failover controller =====

#[tokio::test]
async fn tier_order_and_attempt_budget_on_failure()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![
      transient(), transient(), transient()
    , transient(), transient(), transient()
    ]);
    let outcome = controller(caller.clone())
      .run(&endpoint("a"), "q", false, true)
      .await;

    assert!(outcome.is_none());
    assert_eq!(
      caller.tiers_called("a")
    , vec![
        "primary", "primary", "primary"
      , "backup", "backup", "backup"
      ]
    );
}

#[tokio::test]
async fn fatal_failures_still_consume_the_budget()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![
      fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    ]);
    let outcome = controller(caller.clone())
      .run(&endpoint("a"), "q", false, true)
      .await;

    assert!(outcome.is_none());
    assert_eq!(caller.calls().len(), 6);
}

#[tokio::test]
async fn rate_limit_on_first_primary_attempt_skips_tier()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![
      rate_limited()
    , Step::Succeed("from backup")
    ]);
    let outcome = controller(caller.clone())
      .run(&endpoint("a"), "q", false, true)
      .await;

    let (text, _) = outcome.expect("backup succeeded");
    assert_eq!(text, "from backup");
    assert_eq!(
      caller.tiers_called("a")
    , vec!["primary", "backup"]
    );
}

#[tokio::test]
async fn rate_limit_on_later_attempts_has_no_fast_path()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![
      transient()
    , rate_limited()
    , transient()
    , transient(), transient(), transient()
    ]);
    let outcome = controller(caller.clone())
      .run(&endpoint("a"), "q", false, true)
      .await;

    assert!(outcome.is_none());
    // The primary tier still gets its full budget
    assert_eq!(
      caller.tiers_called("a")
    , vec![
        "primary", "primary", "primary"
      , "backup", "backup", "backup"
      ]
    );
}

#[tokio::test]
async fn rate_limit_on_backup_does_not_skip()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![
      rate_limited()
    , rate_limited()
    , transient()
    , transient()
    ]);
    let outcome = controller(caller.clone())
      .run(&endpoint("a"), "q", false, true)
      .await;

    assert!(outcome.is_none());
    // Fast path applies only to primary attempt 1; the
    // backup tier exhausts its own budget afterwards
    assert_eq!(
      caller.tiers_called("a")
    , vec!["primary", "backup", "backup", "backup"]
    );
}

#[tokio::test]
async fn success_stops_all_further_attempts()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![
      transient()
    , Step::Succeed("answer")
    , Step::Succeed("never reached")
    ]);
    let outcome = controller(caller.clone())
      .run(&endpoint("a"), "q", false, true)
      .await;

    let (text, _) = outcome.expect("second attempt wins");
    assert_eq!(text, "answer");
    assert_eq!(caller.calls().len(), 2);
}

// ===== Dispatcher =====

fn dispatcher(
  caller: ScriptedCaller
, keys: &[&str]
, budget: Duration
) -> Dispatcher<ScriptedCaller>
{   Dispatcher::new(
      registry_with(keys)
    , controller(caller)
    , 5
    , budget
    , StatusSink::null()
    )
}

#[tokio::test]
async fn exactly_one_result_per_requested_key()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![
      Step::Succeed("Paris is the capital of France.")
    ]);
    caller.script("b", vec![
      Step::Hang(Duration::from_secs(30))
    ]);
    caller.script("c", vec![
      fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    , fatal("no choices returned")
    ]);

    let budget = Duration::from_millis(300);
    let keys: Vec<String> = ["a", "b", "c"].iter()
      .map(|k| k.to_string())
      .collect();
    let results
      = dispatcher(caller, &["a", "b", "c"], budget)
        .execute(&keys, "capital of France?", true, false)
        .await;

    assert_eq!(results.len(), 3);
    let seen: HashSet<&str> = results.iter()
      .map(|r| r.endpoint_key.as_str())
      .collect();
    let expected: HashSet<&str>
      = ["a", "b", "c"].iter().copied().collect();
    assert_eq!(seen, expected);

    let by_key = |key: &str| results.iter()
      .find(|r| r.endpoint_key == key)
      .expect("result present");

    let a = by_key("a");
    assert_eq!(a.status, TaskStatus::Success);
    assert_eq!(
      a.response, "Paris is the capital of France."
    );

    let b = by_key("b");
    assert_eq!(b.status, TaskStatus::Timeout);
    assert_eq!(b.elapsed, budget);
    assert!(b.response.is_empty());
    assert_eq!(
      b.error_message.as_deref()
    , Some("Execution timed out")
    );

    let c = by_key("c");
    assert_eq!(c.status, TaskStatus::Error);
    assert_eq!(
      c.error_message.as_deref()
    , Some("No usable response from any API tier")
    );

    let report = ReportAggregator::new()
      .aggregate("capital of France?", &results);
    assert!(
      (report.summary.success_rate - 1.0 / 3.0).abs()
        < 1e-9
    );
}

#[tokio::test]
async fn empty_success_text_is_recorded_as_error()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![Step::Succeed("")]);

    let results = dispatcher(
      caller, &["a"], Duration::from_secs(5)
    )
      .execute(&["a".to_string()], "q", true, false)
      .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, TaskStatus::Error);
    assert_eq!(
      results[0].error_message.as_deref()
    , Some("No usable response from any API tier")
    );
}

#[tokio::test]
async fn unknown_key_yields_immediate_error_record()
{   let caller = ScriptedCaller::new();
    caller.script("a", vec![Step::Succeed("ok")]);

    let keys = vec![
      "a".to_string()
    , "missing".to_string()
    ];
    let results = dispatcher(
      caller.clone(), &["a"], Duration::from_secs(5)
    )
      .execute(&keys, "q", true, false)
      .await;

    assert_eq!(results.len(), 2);
    let missing = results.iter()
      .find(|r| r.endpoint_key == "missing")
      .expect("record for unknown key");
    assert_eq!(missing.status, TaskStatus::Error);
    assert!(missing.error_message.as_deref()
      .unwrap_or_default()
      .contains("Unknown endpoint"));

    // No network attempt was made for the unknown key
    assert!(caller.calls().iter()
      .all(|(key, _)| key == "a"));
}

#[tokio::test]
async fn worker_pool_bounds_are_respected()
{   // 8 hanging endpoints, pool of 5, tiny budget: the
    // batch still yields one result per key
    let caller = ScriptedCaller::new();
    let keys: Vec<String> = (0..8)
      .map(|i| format!("slow_{}", i))
      .collect();
    for key in &keys
    {   caller.script(key, vec![
          Step::Hang(Duration::from_secs(30))
        ]);
    }

    let names: Vec<&str>
      = keys.iter().map(|k| k.as_str()).collect();
    let results = dispatcher(
      caller, &names, Duration::from_millis(200)
    )
      .execute(&keys, "q", true, false)
      .await;

    assert_eq!(results.len(), 8);
    assert!(results.iter()
      .all(|r| r.status == TaskStatus::Timeout));
}

#[tokio::test]
async fn status_lines_arrive_whole_and_in_order()
{   let (sink, mut rx) = StatusSink::channel();
    let caller = ScriptedCaller::new();
    caller.script("a", vec![Step::Succeed("ok")]);

    let dispatcher = Dispatcher::new(
      registry_with(&["a"])
    , FailoverController::new(
        caller, fast_policy(), sink.clone()
      )
    , 5
    , Duration::from_secs(5)
    , sink
    );
    let results = dispatcher
      .execute(&["a".to_string()], "q", true, false)
      .await;
    assert_eq!(results[0].status, TaskStatus::Success);
    drop(dispatcher);

    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv()
    {   lines.push(line);
    }
    assert!(lines.iter().any(|l|
      l.source == "dispatcher"
        && l.text.contains("Starting parallel execution")
    ));
    assert!(lines.iter().any(|l|
      l.source == "A"
        && l.text.contains("attempt 1/3")
    ));
    assert!(lines.iter().any(|l|
      l.source == "dispatcher"
        && l.text == "Succeeded: 1"
    ));
}
