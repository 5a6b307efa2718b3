//! Output stream interception.
//!
//! - **stream**: `OutputStream`, a process stream with replaceable entry points
//! - **ansi**: escape sequences sent to the console surface
//! - **redirect**: installs/restores wrappers that copy output to a surface
//!
//! # Data flow
//!
//! ```text
//! stream.write(text)
//! ├── surface.write(transform(text))
//! └── previous write(text)  ──► ... ──► terminal
//! ```
//!
//! Each session wraps whatever entry point it finds, so several sessions
//! on one stream chain: the newest wrapper runs first.

pub mod ansi;
pub mod redirect;
pub mod stream;

pub use redirect::{SavedStreamState, StreamInterceptor, Transform};
pub use stream::{OutputStream, StreamHooks};
