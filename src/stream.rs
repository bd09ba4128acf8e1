//! Streaming-segment classification: demultiplexes an
//! incremental text stream into "thinking" vs "answer"
//! segments, preserving correctness across chunk boundaries.

use log::{debug, trace};

/// Opening marker of a thinking region
pub const THINK_OPEN: &str = "<think>";
/// Closing marker of a thinking region
pub const THINK_CLOSE: &str = "</think>";

/// Per-call classifier state. Owned exclusively by one
/// endpoint call; never shared across tasks.
///
/// Feed fragments with `push`, then call `finish` once the
/// stream ends. Concatenating the routed answer segments in
/// arrival order reconstructs exactly the non-thinking part
/// of the full response, with every marker consumed once.
#[derive(Debug, Default)]
pub struct StreamClassifier
{   /// Full raw accumulation, markers included
    raw: String
  , /// Accumulated answer text (outside thinking regions)
    answer: String
  , /// Accumulated thinking text (inside thinking regions)
    thinking: String
  , /// Currently inside a thinking region
    in_thinking: bool
  , /// Partial marker held back from the previous fragment
    carry: String
}

impl StreamClassifier
{   /// Create a classifier at the start of a stream
    pub fn new() -> Self
    {   StreamClassifier::default()
    }

    /// Consume one incoming fragment. Returns the answer
    /// text routed by this fragment, for live echo.
    pub fn push(&mut self, fragment: &str) -> String
    {   trace!("Classifier push: {} bytes", fragment.len());
        self.raw.push_str(fragment);

        // Resumable boundary search: always scan the
        // concatenation of leftover carry + new fragment
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(fragment);

        let mut printable = String::new();
        let mut rest = text.as_str();

        loop
        {   match nearest_marker(rest)
            {   Some((idx, marker)) => {
                  self.route(&rest[..idx], &mut printable);
                  self.in_thinking = marker == THINK_OPEN;
                  rest = &rest[idx + marker.len()..];
                }
              , None => {
                  let split = partial_marker_start(rest);
                  self.route(&rest[..split], &mut printable);
                  self.carry = rest[split..].to_string();
                  break;
                }
            }
        }

        printable
    }

    /// Flush state at end of stream. An unterminated
    /// thinking region is flushed to the thinking stream,
    /// never silently dropped.
    pub fn finish(&mut self)
    {   if !self.carry.is_empty()
        {   debug!(
              "Flushing {} carried bytes at stream end",
              self.carry.len()
            );
            let carry = std::mem::take(&mut self.carry);
            let mut sink = String::new();
            self.route(&carry, &mut sink);
        }
    }

    /// Route a segment to whichever stream matches the
    /// current flag state
    fn route(&mut self, segment: &str, printable: &mut String)
    {   if segment.is_empty()
        {   return;
        }
        if self.in_thinking
        {   self.thinking.push_str(segment);
        } else
        {   self.answer.push_str(segment);
            printable.push_str(segment);
        }
    }

    /// Accumulated answer text
    pub fn answer(&self) -> &str
    {   &self.answer
    }

    /// Accumulated thinking text
    pub fn thinking(&self) -> &str
    {   &self.thinking
    }

    /// Full raw accumulation, markers included
    pub fn raw(&self) -> &str
    {   &self.raw
    }

    /// Whether the classifier is inside a thinking region
    pub fn is_in_thinking(&self) -> bool
    {   self.in_thinking
    }

    /// Final text selection. With suppression on and a
    /// non-empty answer stream, the answer stream wins;
    /// otherwise the raw accumulation is returned.
    pub fn into_text(self, suppress_thinking: bool) -> String
    {   if suppress_thinking && !self.answer.is_empty()
        {   self.answer
        } else
        {   self.raw
        }
    }
}

/// Find the nearest occurrence of either marker.
/// Returns (byte index, matched marker).
fn nearest_marker(text: &str) -> Option<(usize, &'static str)>
{   let open = text.find(THINK_OPEN);
    let close = text.find(THINK_CLOSE);
    match (open, close)
    {   (Some(o), Some(c)) => {
          if o <= c
          {   Some((o, THINK_OPEN))
          } else
          {   Some((c, THINK_CLOSE))
          }
        }
      , (Some(o), None) => Some((o, THINK_OPEN))
      , (None, Some(c)) => Some((c, THINK_CLOSE))
      , (None, None) => None
    }
}

/// Byte index where a trailing partial marker begins, or
/// text.len() when the fragment cannot end mid-marker.
/// Markers are ASCII, so candidate splits are always on
/// char boundaries.
fn partial_marker_start(text: &str) -> usize
{   let len = text.len();
    // Longest useful suffix is one byte short of "</think>"
    let max_suffix = (THINK_CLOSE.len() - 1).min(len);
    for k in (1..=max_suffix).rev()
    {   let start = len - k;
        if !text.is_char_boundary(start)
        {   continue;
        }
        let suffix = &text[start..];
        if THINK_OPEN.starts_with(suffix)
          || THINK_CLOSE.starts_with(suffix)
        {   return start;
        }
    }
    len
}

/// Defensive removal of thinking markup from a complete
/// text: paired spans are excised, orphan markers removed.
pub fn strip_thinking(text: &str) -> String
{   let mut out = String::new();
    let mut rest = text;
    loop
    {   match rest.find(THINK_OPEN)
        {   Some(i) => {
              out.push_str(&rest[..i]);
              let after = &rest[i + THINK_OPEN.len()..];
              match after.find(THINK_CLOSE)
              {   Some(j) => {
                    rest = &after[j + THINK_CLOSE.len()..];
                  }
                , None => {
                    // Unpaired opener: drop the tag only
                    rest = after;
                  }
              }
            }
          , None => {
              out.push_str(rest);
              break;
            }
        }
    }
    out.replace(THINK_CLOSE, "")
}
