//! External collaborators of a console session.
//!
//! This module describes what the session drives but does not implement:
//!
//! - **renderer**: the `Renderer` contract (attach/detach/write/state + events)
//! - **view**: host core views a renderer attaches to
//! - **mock**: in-process renderer used when no native one is available
//!
//! # Renderer lifecycle
//!
//! ```text
//! init ──ready──► detached ──attach──► attaching ──► attached
//!                    ▲                                  │
//!                    └──────── detaching ◄──detach──────┘
//! ```

pub mod mock;
pub mod renderer;
pub mod view;
