//! Error types shared by the console session and the renderer contract.

use thiserror::Error;

/// Error reported by a renderer, either as an attach/detach rejection or
/// through its `error` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RendererError(pub String);

impl RendererError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("A display request is already pending")]
    AlreadyPending,

    #[error("This console is not being displayed")]
    NotDisplayed,

    #[error(transparent)]
    Renderer(#[from] RendererError),

    #[error("A console session must be created inside a tokio runtime")]
    NoRuntime,

    /// Renderer events were dropped before the relay saw them, so a
    /// waiting request can no longer tell when it is done.
    #[error("Missed {0} renderer events while a request was waiting")]
    EventsLost(u64),

    /// The session's event relay went away before the request settled.
    #[error("Console session closed before the request settled")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
