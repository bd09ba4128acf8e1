use std::fmt;

/// Custom error type for parsearch operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Endpoint key is not present in the registry
    UnknownEndpoint(String)
  , /// HTTP request error
    HttpError(String)
  , /// Failed to parse API response
    ParseError(String)
  , /// No choices in API response
    NoChoicesInResponse
  , /// Both API tiers exhausted without usable text
    EmptyResponse
  , /// Batch budget elapsed before the task finished
    Timeout
  , /// Generic error
    Other(String)
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::UnknownEndpoint(key) => {
              write!(f, "Unknown endpoint: {}", key)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoChoicesInResponse => {
              write!(f, "API response contained no choices")
            }
          , Error::EmptyResponse => {
              write!(f, "No usable response from any API tier")
            }
          , Error::Timeout => {
              write!(f, "Execution timed out")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

/// Classification of one failed endpoint call.
/// Drives the retry/failover state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind
{   /// Upstream signals overload; triggers the fast
    /// tier-skip on the very first primary attempt
    RateLimited
  , /// Network/timeout/parsing hiccup; retried within
    /// the per-tier attempt budget
    Transient
  , /// Structurally unrecoverable (bad request, auth
    /// failure, no choices); still consumes an attempt
    Fatal
}

impl fmt::Display for FailureKind
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   FailureKind::RateLimited => {
              write!(f, "rate-limited")
            }
          , FailureKind::Transient => {
              write!(f, "transient")
            }
          , FailureKind::Fatal => {
              write!(f, "fatal")
            }
        }
    }
}
