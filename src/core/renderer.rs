//! Renderer contract
//!
//! A renderer owns the real console surface (glyphs, ANSI interpretation,
//! input box). The session only sees this narrow handle.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::view::CoreView;
use crate::error::RendererError;

/// Renderer lifecycle state, owned and mutated by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererState {
    Init,
    Detached,
    Attaching,
    Attached,
    Detaching,
}

impl RendererState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererState::Init => "init",
            RendererState::Detached => "detached",
            RendererState::Attaching => "attaching",
            RendererState::Attached => "attached",
            RendererState::Detaching => "detaching",
        }
    }
}

impl fmt::Display for RendererState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    /// Emitted once after construction; the renderer can now attach
    Ready,
    Attached,
    Detached,
    /// Errors do not change renderer state by themselves
    Error(String),
    /// Surface geometry changed while attached
    Resize { columns: u16, rows: u16 },
}

/// Handle to an external console renderer.
///
/// `attach` and `detach` settle with their own outcome; state transitions
/// are additionally announced on the event stream returned by `subscribe`.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn attach(&self, view: &CoreView) -> Result<(), RendererError>;

    async fn detach(&self) -> Result<(), RendererError>;

    fn state(&self) -> RendererState;

    /// Fire-and-forget forwarding of text to the surface
    fn write(&self, text: &str);

    fn subscribe(&self) -> broadcast::Receiver<RendererEvent>;
}
