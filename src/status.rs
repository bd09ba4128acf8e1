//! Serialized progress reporting for concurrent endpoint
//! calls. Every status line travels whole over one channel,
//! so lines from different endpoints never interleave
//! character-by-character.

use tokio::sync::mpsc;
use log::debug;

/// One human-readable progress line from one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine
{   /// Originating endpoint display name, or "dispatcher"
    pub source: String
  , /// Line text
    pub text: String
}

impl StatusLine
{   /// Render as "[source] text"
    pub fn render(&self) -> String
    {   format!("[{}] {}", self.source, self.text)
    }
}

/// Cloneable sink handle shared by all concurrent tasks.
/// A `None` channel discards everything (null sink).
#[derive(Debug, Clone, Default)]
pub struct StatusSink
{   tx: Option<mpsc::UnboundedSender<StatusLine>>
}

impl StatusSink
{   /// Sink that discards all lines
    pub fn null() -> Self
    {   StatusSink { tx: None }
    }

    /// Sink backed by a channel; the caller owns the
    /// receiving end and decides how to drain it
    pub fn channel()
      -> (Self, mpsc::UnboundedReceiver<StatusLine>)
    {   let (tx, rx) = mpsc::unbounded_channel();
        (StatusSink { tx: Some(tx) }, rx)
    }

    /// Sink draining to standard output on a background
    /// task, one whole line at a time
    pub fn stdout() -> Self
    {   debug!("Creating stdout StatusSink");
        let (sink, mut rx) = StatusSink::channel();
        tokio::spawn(async move {
          while let Some(line) = rx.recv().await
          {   println!("{}", line.render());
          }
        });
        sink
    }

    /// Emit one progress line. Dropped receivers are
    /// ignored: progress reporting must never fail a call.
    pub fn line(
      &self
    , source: &str
    , text: impl Into<String>
    )
    {   if let Some(tx) = &self.tx
        {   let _ = tx.send(StatusLine
            {   source: source.to_string()
              , text: text.into()
            });
        }
    }
}
