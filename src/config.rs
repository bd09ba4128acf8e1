//! Configuration for API tiers, failover and dispatch behavior

use serde::{Deserialize, Serialize};
use log::debug;

const DEFAULT_PRIMARY_BASE: &str
  = "https://yunwu.ai/v1";
const DEFAULT_BACKUP_BASE: &str
  = "https://openkey.cloud/v1";

/// Two-tier API configuration.
/// Credentials are read from the environment, never baked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig
{   /// Primary API base URL
    pub primary_base: String
  , /// Primary API key
    pub primary_key: String
  , /// Backup API base URL
    pub backup_base: String
  , /// Backup API key
    pub backup_key: String
}

impl ApiConfig
{   /// Build from explicit values
    pub fn new(
      primary_base: String
    , primary_key: String
    , backup_base: String
    , backup_key: String
    ) -> Self
    {   ApiConfig
        {   primary_base
          , primary_key
          , backup_base
          , backup_key
        }
    }

    /// Read keys (and optional base overrides) from the
    /// environment: PARSEARCH_PRIMARY_KEY, PARSEARCH_BACKUP_KEY,
    /// PARSEARCH_PRIMARY_BASE, PARSEARCH_BACKUP_BASE
    pub fn from_env() -> Self
    {   debug!("Loading ApiConfig from environment");
        ApiConfig
        {   primary_base: std::env::var("PARSEARCH_PRIMARY_BASE")
              .unwrap_or_else(|_|
                DEFAULT_PRIMARY_BASE.to_string()
              )
          , primary_key: std::env::var("PARSEARCH_PRIMARY_KEY")
              .unwrap_or_default()
          , backup_base: std::env::var("PARSEARCH_BACKUP_BASE")
              .unwrap_or_else(|_|
                DEFAULT_BACKUP_BASE.to_string()
              )
          , backup_key: std::env::var("PARSEARCH_BACKUP_KEY")
              .unwrap_or_default()
        }
    }

    /// Tier-ordered target list: primary first, backup second
    pub fn targets(&self) -> Vec<crate::ApiTarget>
    {   vec![
          crate::ApiTarget
          {   tier: "primary".to_string()
            , base: self.primary_base.clone()
            , key: self.primary_key.clone()
          }
        , crate::ApiTarget
          {   tier: "backup".to_string()
            , base: self.backup_base.clone()
            , key: self.backup_key.clone()
          }
        ]
    }
}

impl Default for ApiConfig
{   fn default() -> Self
    {   ApiConfig::from_env()
    }
}

/// Failover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig
{   /// Attempts per API tier
    pub attempts_per_tier: usize
  , /// Base backoff duration in seconds; the wait before
    /// retry n is base * 2^(n-1) (8s, 16s by default)
    pub backoff_base_secs: u64
}

impl Default for FailoverConfig
{   fn default() -> Self
    {   FailoverConfig
        {   attempts_per_tier: 3
          , backoff_base_secs: 8
        }
    }
}

/// Concurrent dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig
{   /// Max concurrent in-flight endpoint calls
    pub max_workers: usize
  , /// Global wall-clock budget for a batch, in seconds
    pub timeout_secs: u64
}

impl Default for DispatchConfig
{   fn default() -> Self
    {   DispatchConfig
        {   max_workers: 5
          , timeout_secs: 300
        }
    }
}

/// Top-level parsearch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchConfig
{   /// API tier configuration
    pub api: ApiConfig
  , /// Failover configuration
    pub failover: FailoverConfig
  , /// Dispatch configuration
    pub dispatch: DispatchConfig
}
