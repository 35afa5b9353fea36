//! Optional render sink for produced text.
//!
//! Some frontends turn tutor replies into playable audio. The sink is a side
//! collaborator: it gets the final text of a turn and may produce an artifact
//! on disk, fully independent of the dispatch loop.

use std::path::PathBuf;

use anyhow::Result;

pub trait RenderSink: Send + Sync {
    /// Render the text, returning the path of the produced artifact if any
    fn render(&self, text: &str) -> Result<Option<PathBuf>>;
}

/// A sink that produces nothing
pub struct NullRenderSink;

impl RenderSink for NullRenderSink {
    fn render(&self, _text: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}
