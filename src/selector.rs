//! Keyword-based endpoint recommendation: scores each
//! registered endpoint against the query text and returns
//! an ordered key list for the dispatcher's callers.

use log::debug;
use crate::registry::EndpointRegistry;

/// Static keyword affinities per endpoint key
const ENDPOINT_KEYWORDS: &[(&str, &[&str])] = &[
  ( "google_deep_research"
  , &["research", "academic", "deep", "analysis", "search"]
  )
, ( "google_deep_research_pro"
  , &["complex", "professional", "advanced", "research"]
  )
, ( "grok_deep_search"
  , &["creative", "reasoning", "logic", "novel", "idea"]
  )
, ( "hunyuan_t1"
  , &["chinese", "local", "china"]
  )
, ( "hunyuan_t1_latest"
  , &["chinese", "latest", "search"]
  )
, ( "gpt_search"
  , &["general", "balanced", "everyday", "stable", "search"]
  )
, ( "gemini_25_flash_all"
  , &["fast", "quick", "realtime", "efficient"]
  )
, ( "gemini_25_pro_all"
  , &["professional", "thorough", "multi", "domain"]
  )
, ( "deepseek_search"
  , &["code", "technical", "programming", "engineering"]
  )
, ( "kimi_search"
  , &["chinese", "quick", "accurate", "news"]
  )
, ( "gpt4_gizmo"
  , &["tool", "howto", "practical", "guide"]
  )
, ( "deepseek_v3"
  , &["technical", "latest", "performance"]
  )
, ( "gpt4_all"
  , &["general", "writing", "summary"]
  )
, ( "gpt4o_all"
  , &["general", "fast", "multimodal"]
  )
, ( "o3_deep_research_20250626"
  , &["research", "deep", "long", "report"]
  )
, ( "o4_mini_deep_research_20250626"
  , &["research", "quick", "cheap"]
  )
, ( "o4_mini_deep_research"
  , &["research", "quick", "cheap"]
  )
, ( "o3_deep_research"
  , &["research", "deep", "long", "report"]
  )
];

/// Keys tried first when nothing in the query matches
const FALLBACK_KEYS: &[&str] = &[
  "gpt_search"
, "google_deep_research"
, "deepseek_search"
];

/// One scored recommendation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation
{   pub key: String
  , pub score: usize
  , pub matched: Vec<String>
}

/// Scores endpoints against query text. Pure, no I/O.
#[derive(Debug, Clone, Default)]
pub struct SmartSelector;

impl SmartSelector
{   pub fn new() -> Self
    {   SmartSelector
    }

    /// Top-n endpoint keys for a query, best match first.
    /// Only registered endpoints are considered; with no
    /// keyword hits at all, registered fallback keys are
    /// returned instead.
    pub fn recommend(
      &self
    , registry: &EndpointRegistry
    , query: &str
    , n: usize
    ) -> Vec<Recommendation>
    {   let lowered = query.to_lowercase();
        let mut scored: Vec<Recommendation> = Vec::new();

        for &(key, keywords) in ENDPOINT_KEYWORDS
        {   if !registry.contains(key)
            {   continue;
            }
            let matched: Vec<String> = keywords.iter()
              .filter(|kw| lowered.contains(**kw))
              .map(|kw| kw.to_string())
              .collect();
            if !matched.is_empty()
            {   scored.push(Recommendation
                {   key: key.to_string()
                  , score: matched.len()
                  , matched
                });
            }
        }

        if scored.is_empty()
        {   debug!("No keyword hits, using fallback keys");
            return FALLBACK_KEYS.iter()
              .filter(|key| registry.contains(key))
              .take(n)
              .map(|key| Recommendation
                {   key: key.to_string()
                  , score: 0
                  , matched: vec![]
                })
              .collect();
        }

        // Stable by key so equal scores order
        // deterministically
        scored.sort_by(|a, b|
          b.score.cmp(&a.score)
            .then_with(|| a.key.cmp(&b.key))
        );
        scored.truncate(n);
        scored
    }
}
