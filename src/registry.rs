//! Endpoint registry: one data-driven table of callable
//! search endpoints, replacing any per-model type hierarchy.
//! Configs are built once and shared read-only afterwards.

use std::collections::HashMap;
use log::debug;
use crate::config::ApiConfig;
use crate::{ApiTarget, EndpointConfig};

/// Seed rows: key, display name, model id, description,
/// max tokens, request timeout (seconds). Temperature is
/// 0.7 across the board.
const DEFAULT_ENDPOINTS: &[(
  &str, &str, &str, &str, usize, u64
)] = &[
  ( "google_deep_research"
  , "Google Deep Research"
  , "gemini-2.5-flash-deepsearch"
  , "Google Gemini 2.5 Flash deep search model"
  , 3000, 150
  )
, ( "google_deep_research_pro"
  , "Google Deep Research Pro"
  , "gemini-2.5-pro-deepsearch"
  , "Google Gemini 2.5 Pro deep search model"
  , 4000, 180
  )
, ( "grok_deep_search"
  , "Grok Deep Search"
  , "grok-3-deepsearch"
  , "xAI Grok 3 deep search model"
  , 2800, 120
  )
, ( "hunyuan_t1"
  , "Hunyuan T1"
  , "hunyuan-t1-latest"
  , "Tencent Hunyuan T1 model"
  , 3000, 150
  )
, ( "hunyuan_t1_latest"
  , "Hunyuan T1 Latest"
  , "hunyuan-t1-latest"
  , "Tencent Hunyuan T1 latest, search-enabled"
  , 3000, 150
  )
, ( "gpt_search"
  , "GPT Search"
  , "gpt-4o-search-preview-2025-03-11"
  , "OpenAI GPT-4o search model"
  , 3500, 120
  )
, ( "gemini_25_flash_all"
  , "Gemini 2.5 Flash All"
  , "gemini-2.5-flash-all"
  , "Google Gemini 2.5 Flash All model"
  , 2800, 120
  )
, ( "gemini_25_pro_all"
  , "Gemini 2.5 Pro All"
  , "gemini-2.5-pro-all"
  , "Google Gemini 2.5 Pro All model"
  , 4000, 180
  )
, ( "deepseek_search"
  , "DeepSeek Search"
  , "deepseek-r1-searching"
  , "DeepSeek R1 searching model"
  , 3200, 150
  )
, ( "kimi_search"
  , "Kimi Search"
  , "kimi-k2-0711-preview-search"
  , "Kimi K2 search model"
  , 3000, 150
  )
, ( "gpt4_gizmo"
  , "GPT-4 Gizmo"
  , "gpt-4-gizmo-*"
  , "OpenAI GPT-4 Gizmo model"
  , 2500, 100
  )
, ( "deepseek_v3"
  , "DeepSeek V3"
  , "deepseek-v3-250324"
  , "DeepSeek V3 model"
  , 3500, 150
  )
, ( "gpt4_all"
  , "GPT-4 All"
  , "gpt-4-all"
  , "OpenAI GPT-4 All model"
  , 3000, 120
  )
, ( "gpt4o_all"
  , "GPT-4o All"
  , "gpt-4o-all"
  , "OpenAI GPT-4o All model"
  , 3200, 100
  )
, ( "o3_deep_research_20250626"
  , "O3 Deep Research 2025-06-26"
  , "o3-deep-research-2025-06-26"
  , "O3 deep research 2025-06-26 model"
  , 3500, 150
  )
, ( "o4_mini_deep_research_20250626"
  , "O4 Mini Deep Research 2025-06-26"
  , "o4-mini-deep-research-2025-06-26"
  , "O4 Mini deep research 2025-06-26 model"
  , 2500, 120
  )
, ( "o4_mini_deep_research"
  , "O4 Mini Deep Research"
  , "o4-mini-deep-research"
  , "O4 Mini deep research model"
  , 2500, 120
  )
, ( "o3_deep_research"
  , "O3 Deep Research"
  , "o3-deep-research"
  , "O3 deep research model"
  , 3500, 150
  )
];

/// Endpoint registry
#[derive(Debug, Clone)]
pub struct EndpointRegistry
{   endpoints: HashMap<String, EndpointConfig>
  , targets: Vec<ApiTarget>
}

impl EndpointRegistry
{   /// Create a registry seeded with the default endpoint
    /// table; every endpoint shares the two-tier targets
    /// built from the API configuration
    pub fn new(api: &ApiConfig) -> Self
    {   debug!("Building endpoint registry");
        let targets = api.targets();
        let mut registry = EndpointRegistry
        {   endpoints: HashMap::new()
          , targets
        };
        for &(key, name, model_id, desc, tokens, timeout)
          in DEFAULT_ENDPOINTS
        {   registry.register(EndpointConfig
            {   key: key.to_string()
              , display_name: name.to_string()
              , model_id: model_id.to_string()
              , description: desc.to_string()
              , temperature: 0.7
              , max_tokens: tokens
              , request_timeout_secs: timeout
              , targets: registry.targets.clone()
            });
        }
        debug!(
          "Registered {} default endpoints",
          registry.endpoints.len()
        );
        registry
    }

    /// Create an empty registry (tests, custom tables)
    pub fn empty(api: &ApiConfig) -> Self
    {   EndpointRegistry
        {   endpoints: HashMap::new()
          , targets: api.targets()
        }
    }

    /// Register or replace an endpoint
    pub fn register(&mut self, config: EndpointConfig)
    {   debug!("Registering endpoint: {}", config.key);
        self.endpoints.insert(config.key.clone(), config);
    }

    /// Remove an endpoint; true when it existed
    pub fn unregister(&mut self, key: &str) -> bool
    {   self.endpoints.remove(key).is_some()
    }

    /// Look up one endpoint config
    pub fn get(&self, key: &str) -> Option<&EndpointConfig>
    {   self.endpoints.get(key)
    }

    /// Display name for a key; derived from the key when
    /// the endpoint is unknown
    pub fn display_name(&self, key: &str) -> String
    {   self.endpoints.get(key)
          .map(|c| c.display_name.clone())
          .unwrap_or_else(||
            EndpointConfig::title_from_key(key)
          )
    }

    /// Whether a key is registered
    pub fn contains(&self, key: &str) -> bool
    {   self.endpoints.contains_key(key)
    }

    /// All endpoint keys, sorted for stable iteration
    pub fn list_keys(&self) -> Vec<String>
    {   let mut keys: Vec<String>
          = self.endpoints.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered endpoints
    pub fn count(&self) -> usize
    {   self.endpoints.len()
    }

    /// The shared tier-ordered target list
    pub fn targets(&self) -> &[ApiTarget]
    {   &self.targets
    }
}
