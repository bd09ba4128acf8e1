//! One OpenAI-compatible chat completion call against an
//! explicit (base URL, credential) target. No process-wide
//! client state is ever mutated; every call carries its own
//! target.

use std::time::{Duration, Instant};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, trace, error};

use crate::error::FailureKind;
use crate::status::StatusSink;
use crate::stream::StreamClassifier;
use crate::{ApiTarget, EndpointConfig};

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: String
}

impl ChatMessage
{   pub fn user(content: impl Into<String>) -> Self
    {   ChatMessage
        {   role: "user".to_string()
          , content: content.into()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub stream: bool
  , pub temperature: f32
  , pub max_tokens: usize
}

// ===== Call Outcome =====

/// Result of exactly one network request
#[derive(Debug, Clone)]
pub enum CallOutcome
{   Success
    {   /// Final text (thinking already handled)
        text: String
      , /// Raw response handle (last parsed body/chunk)
        raw: Value
      , /// Wall time of this attempt
        elapsed: Duration
    }
  , Failure
    {   kind: FailureKind
      , message: String
      , elapsed: Duration
    }
}

/// Seam between the retry controller and the network.
/// Performs exactly one request per invocation.
#[async_trait]
pub trait CallEndpoint: Send + Sync
{   async fn call(
      &self
    , config: &EndpointConfig
    , target: &ApiTarget
    , query: &str
    , streaming: bool
    , suppress_thinking: bool
    ) -> CallOutcome;
}

// ===== HTTP Caller =====

/// Endpoint caller over a shared reqwest client
pub struct EndpointCaller
{   http: reqwest::Client
  , sink: StatusSink
}

impl EndpointCaller
{   pub fn new(sink: StatusSink) -> Self
    {   debug!("Creating EndpointCaller");
        EndpointCaller
        {   http: reqwest::Client::new()
          , sink
        }
    }

    async fn perform(
      &self
    , config: &EndpointConfig
    , target: &ApiTarget
    , query: &str
    , streaming: bool
    , suppress_thinking: bool
    ) -> Result<(String, Value), (FailureKind, String)>
    {   let request = ChatRequest
        {   model: config.model_id.clone()
          , messages: vec![ChatMessage::user(query)]
          , stream: streaming
          , temperature: config.temperature
          , max_tokens: config.max_tokens
        };

        trace!("Chat request: {:?}", request);
        self.sink.line(
          &config.display_name
        , format!("API base: {}", target.base)
        );
        self.sink.line(
          &config.display_name
        , format!("Model: {}", config.model_id)
        );

        let response = self.http
          .post(format!("{}/chat/completions", target.base))
          .header(
            "Authorization"
          , format!("Bearer {}", target.key)
          )
          .header("Content-Type", "application/json")
          .timeout(Duration::from_secs(
            config.request_timeout_secs
          ))
          .json(&request)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            classify_transport_error(&e)
          })?;

        let status = response.status();
        trace!("Response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("API error {}: {}", status, error_text);
            return Err(classify_status_error(
              status, &error_text
            ));
        }

        if streaming
        {   self.process_stream(
              response, suppress_thinking
            ).await
        } else
        {   process_body(response, suppress_thinking).await
        }
    }

    /// Feed every received chunk through the classifier;
    /// on malformed or absent incremental chunks, fall back
    /// once to the final aggregated response object.
    async fn process_stream(
      &self
    , response: reqwest::Response
    , suppress_thinking: bool
    ) -> Result<(String, Value), (FailureKind, String)>
    {   let mut classifier = StreamClassifier::new();
        let mut last_value = Value::Null;
        let mut events = response.bytes_stream().eventsource();

        while let Some(event) = events.next().await
        {   match event
            {   Ok(event) => {
                  let data = event.data.trim().to_string();
                  if data == "[DONE]"
                  {   break;
                  }
                  if data.is_empty()
                  {   continue;
                  }
                  match serde_json::from_str::<Value>(&data)
                  {   Ok(value) => {
                        if let Some(delta) = chunk_text(&value)
                        {   classifier.push(delta);
                        }
                        last_value = value;
                      }
                    , Err(e) => {
                        trace!(
                          "Skipping malformed chunk: {}", e
                        );
                      }
                  }
                }
              , Err(e) => {
                  // A broken stream must fail the attempt;
                  // a truncated accumulation is not a
                  // usable answer
                  error!("Stream transport error: {}", e);
                  return Err((
                    FailureKind::Transient
                  , format!("Stream interrupted: {}", e)
                  ));
                }
            }
        }

        classifier.finish();

        if classifier.raw().is_empty()
        {   // One fallback extraction from the aggregated
            // response object
            if let Some(text) = body_text(&last_value)
            {   let owned = text.to_string();
                classifier.push(&owned);
                classifier.finish();
            }
        }

        if classifier.raw().is_empty()
        {   return Err((
              FailureKind::Fatal
            , "no valid response received".to_string()
            ));
        }

        Ok((
          classifier.into_text(suppress_thinking)
        , last_value
        ))
    }
}

/// Non-streaming body handling: the response must contain
/// at least one completion choice.
async fn process_body(
  response: reqwest::Response
, suppress_thinking: bool
) -> Result<(String, Value), (FailureKind, String)>
{   let value: Value = response.json().await
      .map_err(|e| {
        error!("Parse error: {}", e);
        (
          FailureKind::Transient
        , crate::Error::ParseError(e.to_string())
            .to_string()
        )
      })?;

    let has_choices = value.get("choices")
      .and_then(|c| c.as_array())
      .map(|c| !c.is_empty())
      .unwrap_or(false);
    if !has_choices
    {   return Err((
          FailureKind::Fatal
        , crate::Error::NoChoicesInResponse.to_string()
        ));
    }

    let content = body_text(&value)
      .unwrap_or_default()
      .to_string();
    if content.is_empty()
    {   return Err((
          FailureKind::Fatal
        , "no valid response received".to_string()
        ));
    }

    let text = if suppress_thinking
    {   let mut classifier = StreamClassifier::new();
        classifier.push(&content);
        classifier.finish();
        classifier.into_text(true)
    } else
    {   content
    };

    Ok((text, value))
}

#[async_trait]
impl CallEndpoint for EndpointCaller
{   async fn call(
      &self
    , config: &EndpointConfig
    , target: &ApiTarget
    , query: &str
    , streaming: bool
    , suppress_thinking: bool
    ) -> CallOutcome
    {   let start = Instant::now();
        match self.perform(
          config, target, query, streaming, suppress_thinking
        ).await
        {   Ok((text, raw)) => {
              let elapsed = start.elapsed();
              self.sink.line(
                &config.display_name
              , format!(
                  "Elapsed: {:.2} s", elapsed.as_secs_f64()
                )
              );
              CallOutcome::Success { text, raw, elapsed }
            }
          , Err((kind, message)) => {
              CallOutcome::Failure
              {   kind
                , message
                , elapsed: start.elapsed()
              }
            }
        }
    }
}

/// Incremental text of one streamed chunk. Understands the
/// standard delta shape and the bare-content shape some
/// relay APIs emit.
fn chunk_text(value: &Value) -> Option<&str>
{   if let Some(delta) = value
      .pointer("/choices/0/delta/content")
      .and_then(|c| c.as_str())
    {   return Some(delta);
    }
    value.get("content").and_then(|c| c.as_str())
}

/// Full text of an aggregated response object
fn body_text(value: &Value) -> Option<&str>
{   if let Some(content) = value
      .pointer("/choices/0/message/content")
      .and_then(|c| c.as_str())
    {   return Some(content);
    }
    value.get("content").and_then(|c| c.as_str())
}

/// Map a transport failure onto the retry taxonomy
fn classify_transport_error(
  e: &reqwest::Error
) -> (FailureKind, String)
{   if e.is_timeout()
    {   (
          FailureKind::Transient
        , format!("Request timed out: {}", e)
        )
    } else
    {   (
          FailureKind::Transient
        , crate::Error::HttpError(e.to_string())
            .to_string()
        )
    }
}

/// Map an HTTP error status onto the retry taxonomy
fn classify_status_error(
  status: reqwest::StatusCode
, body: &str
) -> (FailureKind, String)
{   let lowered = body.to_lowercase();
    if status.as_u16() == 429
      || lowered.contains("overloaded")
      || lowered.contains("rate limit")
    {   return (
          FailureKind::RateLimited
        , format!("API overloaded ({}): {}", status, body)
        );
    }
    match status.as_u16()
    {   400 | 401 | 403 => {
          (
            FailureKind::Fatal
          , format!("API rejected request ({}): {}", status, body)
          )
        }
      , _ => {
          (
            FailureKind::Transient
          , format!("API error ({}): {}", status, body)
          )
        }
    }
}
