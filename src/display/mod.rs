//! Display controller.
//!
//! - **machine**: pure entry tables and event transitions for display/hide
//! - **session**: `ConsoleSession`, which owns the renderer handle, the
//!   stream interceptor and the event relay task
//!
//! # Architecture
//!
//! ```text
//! ConsoleSession
//! ├── Renderer (external, Arc<dyn Renderer>)
//! ├── StreamInterceptor (stdout + stderr)
//! └── relay task
//!     ├── bookkeeping (parent, stream geometry)
//!     ├── machine::transition for armed requests
//!     └── ConsoleEvent broadcast
//! ```

pub mod machine;
pub mod session;

pub use machine::Phase;
pub use session::{ConsoleEvent, ConsoleSession};
