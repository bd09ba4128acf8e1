//! Concurrent fan-out of one query across many endpoints:
//! a bounded worker pool, a global wall-clock budget, and
//! exactly one result per requested endpoint key no matter
//! how each task ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout_at;
use log::{debug, error, info};

use crate::caller::{CallEndpoint, EndpointCaller};
use crate::config::SearchConfig;
use crate::failover::{FailoverController, RetryPolicy};
use crate::registry::EndpointRegistry;
use crate::status::StatusSink;

/// Final status of one endpoint task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus
{   Success
  , Error
  , Timeout
}

impl std::fmt::Display for TaskStatus
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   match self
        {   TaskStatus::Success => write!(f, "success")
          , TaskStatus::Error => write!(f, "error")
          , TaskStatus::Timeout => write!(f, "timeout")
        }
    }
}

/// Per-endpoint final record; immutable once created
#[derive(Debug, Clone)]
pub struct TaskResult
{   /// Logical endpoint key
    pub endpoint_key: String
  , /// Human-readable endpoint name
    pub display_name: String
  , /// success / error / timeout
    pub status: TaskStatus
  , /// Response text; empty on failure
    pub response: String
  , /// Wall time of the task
    pub elapsed: Duration
  , /// Error message on failure
    pub error_message: Option<String>
  , /// Raw response handle on success
    pub raw_response: Option<Value>
}

impl TaskResult
{   fn failed(
      key: &str
    , name: &str
    , status: TaskStatus
    , elapsed: Duration
    , message: String
    ) -> Self
    {   TaskResult
        {   endpoint_key: key.to_string()
          , display_name: name.to_string()
          , status
          , response: String::new()
          , elapsed
          , error_message: Some(message)
          , raw_response: None
        }
    }
}

/// Concurrent dispatcher over any endpoint caller
pub struct Dispatcher<C: CallEndpoint + 'static>
{   registry: Arc<EndpointRegistry>
  , controller: Arc<FailoverController<C>>
  , max_workers: usize
  , budget: Duration
  , sink: StatusSink
}

impl Dispatcher<EndpointCaller>
{   /// Dispatcher wired to the real HTTP caller
    pub fn over_http(
      registry: EndpointRegistry
    , config: &SearchConfig
    , sink: StatusSink
    ) -> Self
    {   let caller = EndpointCaller::new(sink.clone());
        let controller = FailoverController::new(
          caller
        , RetryPolicy::from_config(&config.failover)
        , sink.clone()
        );
        Dispatcher::new(
          registry
        , controller
        , config.dispatch.max_workers
        , Duration::from_secs(config.dispatch.timeout_secs)
        , sink
        )
    }
}

impl<C: CallEndpoint + 'static> Dispatcher<C>
{   pub fn new(
      registry: EndpointRegistry
    , controller: FailoverController<C>
    , max_workers: usize
    , budget: Duration
    , sink: StatusSink
    ) -> Self
    {   debug!(
          "Creating Dispatcher (workers: {}, budget: {:?})"
        , max_workers, budget
        );
        Dispatcher
        {   registry: Arc::new(registry)
          , controller: Arc::new(controller)
          , max_workers
          , budget
          , sink
        }
    }

    /// Run one query against every requested endpoint key
    /// concurrently. Every key yields exactly one
    /// TaskResult: success, error, or timeout.
    pub async fn execute(
      &self
    , keys: &[String]
    , query: &str
    , suppress_thinking: bool
    , streaming: bool
    ) -> Vec<TaskResult>
    {   self.sink.line(
          "dispatcher"
        , format!(
            "Starting parallel execution of {} endpoints"
          , keys.len()
          )
        );
        self.sink.line(
          "dispatcher"
        , format!("Timeout: {}s", self.budget.as_secs())
        );
        self.sink.line(
          "dispatcher"
        , format!(
            "Thinking suppression: {}"
          , if suppress_thinking { "on" } else { "off" }
          )
        );
        self.sink.line(
          "dispatcher"
        , format!(
            "Streaming: {}"
          , if streaming { "on" } else { "off" }
          )
        );

        let start = Instant::now();
        let semaphore
          = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        let mut in_flight: HashMap<
          tokio::task::Id, (String, String)
        > = HashMap::new();
        let mut results: Vec<TaskResult> = Vec::new();

        for key in keys
        {   let config = match self.registry.get(key)
            {   Some(config) => config.clone()
              , None => {
                  // Misconfiguration surfaces immediately,
                  // before any network activity
                  error!("Unknown endpoint key: {}", key);
                  self.sink.line(
                    "dispatcher"
                  , format!("Unknown endpoint: {}", key)
                  );
                  results.push(TaskResult::failed(
                    key
                  , &self.registry.display_name(key)
                  , TaskStatus::Error
                  , Duration::ZERO
                  , crate::Error::UnknownEndpoint(
                      key.clone()
                    ).to_string()
                  ));
                  continue;
                }
            };

            let controller = Arc::clone(&self.controller);
            let semaphore = Arc::clone(&semaphore);
            let sink = self.sink.clone();
            let query = query.to_string();

            let handle = tasks.spawn(async move {
              let _permit = semaphore
                .acquire_owned()
                .await
                .ok();
              sink.line(
                &config.display_name
              , format!("Running {}...", config.display_name)
              );

              let task_start = Instant::now();
              let outcome = controller.run(
                &config
              , &query
              , streaming
              , suppress_thinking
              ).await;
              let elapsed = task_start.elapsed();

              match outcome
              {   Some((text, raw)) if !text.is_empty() => {
                    TaskResult
                    {   endpoint_key: config.key.clone()
                      , display_name:
                          config.display_name.clone()
                      , status: TaskStatus::Success
                      , response: text
                      , elapsed
                      , error_message: None
                      , raw_response: Some(raw)
                    }
                  }
                , _ => {
                    TaskResult::failed(
                      &config.key
                    , &config.display_name
                    , TaskStatus::Error
                    , elapsed
                    , crate::Error::EmptyResponse
                        .to_string()
                    )
                  }
              }
            });
            in_flight.insert(
              handle.id()
            , (
                key.clone()
              , self.registry.display_name(key)
              )
            );
        }

        let submitted = in_flight.len();
        self.sink.line(
          "dispatcher"
        , format!("Submitted {} tasks", submitted)
        );

        let deadline
          = tokio::time::Instant::now() + self.budget;
        let mut completed = 0usize;

        while !tasks.is_empty()
        {   match timeout_at(
              deadline, tasks.join_next_with_id()
            ).await
            {   Ok(Some(Ok((id, result)))) => {
                  in_flight.remove(&id);
                  completed += 1;
                  match result.status
                  {   TaskStatus::Success => {
                        self.sink.line(
                          "dispatcher"
                        , format!(
                            "{} completed ({:.2}s) \
                             [{}/{} done]"
                          , result.display_name
                          , result.elapsed.as_secs_f64()
                          , completed
                          , submitted
                          )
                        );
                      }
                    , _ => {
                        self.sink.line(
                          "dispatcher"
                        , format!(
                            "{} failed: {} [{}/{} done]"
                          , result.display_name
                          , result.error_message
                              .as_deref()
                              .unwrap_or("unknown error")
                          , completed
                          , submitted
                          )
                        );
                      }
                  }
                  results.push(result);
                }
              , Ok(Some(Err(join_err))) => {
                  // Task panicked before completing
                  let id = join_err.id();
                  completed += 1;
                  if let Some((key, name))
                    = in_flight.remove(&id)
                  {   error!(
                        "Task for {} crashed: {}"
                      , key, join_err
                      );
                      self.sink.line(
                        "dispatcher"
                      , format!(
                          "{} crashed: {}", name, join_err
                        )
                      );
                      results.push(TaskResult::failed(
                        &key
                      , &name
                      , TaskStatus::Error
                      , start.elapsed()
                      , join_err.to_string()
                      ));
                  }
                }
              , Ok(None) => {
                  break;
                }
              , Err(_) => {
                  // Global budget elapsed: stop waiting and
                  // record a timeout for every outstanding
                  // key. In-flight calls are detached, not
                  // interrupted.
                  info!(
                    "Global budget elapsed with {} tasks \
                     outstanding"
                  , in_flight.len()
                  );
                  for (_, (key, name)) in in_flight.drain()
                  {   self.sink.line(
                        "dispatcher"
                      , format!("{} timed out", name)
                      );
                      results.push(TaskResult::failed(
                        &key
                      , &name
                      , TaskStatus::Timeout
                      , self.budget
                      , crate::Error::Timeout.to_string()
                      ));
                  }
                  tasks.detach_all();
                  break;
                }
            }
        }

        let succeeded = results.iter()
          .filter(|r| r.status == TaskStatus::Success)
          .count();
        self.sink.line(
          "dispatcher", "Parallel execution complete"
        );
        self.sink.line(
          "dispatcher"
        , format!("Total: {} endpoints", keys.len())
        );
        self.sink.line(
          "dispatcher"
        , format!("Succeeded: {}", succeeded)
        );
        self.sink.line(
          "dispatcher"
        , format!("Failed: {}", results.len() - succeeded)
        );
        self.sink.line(
          "dispatcher"
        , format!(
            "Total elapsed: {:.2}s"
          , start.elapsed().as_secs_f64()
          )
        );

        results
    }
}
