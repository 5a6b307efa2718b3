//! console-surface - route stdout/stderr through an attachable console surface
//!
//! A [`ConsoleSession`] redirects the process output streams so everything
//! written to them is also forwarded to an externally rendered console
//! surface, and lets that surface be attached to and detached from a host
//! view with `display` / `hide`.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use console_surface::{ConsoleOptions, ConsoleSession, MockRenderer};
//!
//! let options = ConsoleOptions::load();
//! let renderer = Arc::new(MockRenderer::with_style(options.style()));
//! let console = ConsoleSession::new(renderer.clone(), options)?;
//! renderer.make_ready();
//!
//! console.display(None).await?;
//! console.stderr().write("Welcome\n");
//! console.hide().await?;
//! ```
//!
//! # Modules
//!
//! - **core**: renderer contract, host views, mock renderer
//! - **intercept**: output streams and their redirection
//! - **display**: display/hide state machine and the session
//! - **config**: options, colors, config file

pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod intercept;

pub use crate::config::{Color, ConfigError, ConsoleOptions, SurfaceStyle};
pub use crate::core::mock::{MockCall, MockRenderer};
pub use crate::core::renderer::{Renderer, RendererEvent, RendererState};
pub use crate::core::view::CoreView;
pub use crate::display::{ConsoleEvent, ConsoleSession};
pub use crate::error::{ConsoleError, RendererError};
pub use crate::intercept::{OutputStream, StreamInterceptor, Transform};
