//! In-process renderer
//!
//! Stands in for a native renderer when none is available (demo mode and
//! tests). It follows the same lifecycle as the native surfaces and keeps
//! a log of every call so callers can check what the session asked for.
//!
//! In automatic mode (the default) attach and detach complete at once:
//! the state goes straight from `detached` to `attached` and back, so
//! nobody, event listeners included, ever observes `attaching` or
//! `detaching`. In manual mode they stop in `attaching`/`detaching` until
//! [`MockRenderer::finish_attach`] / [`MockRenderer::finish_detach`] run,
//! which lets tests interleave requests with in-flight transitions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use super::renderer::{Renderer, RendererEvent, RendererState};
use super::view::CoreView;
use crate::config::SurfaceStyle;
use crate::error::RendererError;

/// A call the session made on the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Attach(CoreView),
    Detach,
}

type Waiter = oneshot::Sender<Result<(), RendererError>>;

struct MockInner {
    state: RendererState,
    style: SurfaceStyle,
    view: Option<CoreView>,
    manual: bool,
    calls: Vec<MockCall>,
    written: Vec<String>,
    attach_waiter: Option<Waiter>,
    detach_waiter: Option<Waiter>,
}

pub struct MockRenderer {
    inner: Mutex<MockInner>,
    events: broadcast::Sender<RendererEvent>,
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRenderer {
    /// Create a renderer in `init`; call [`MockRenderer::make_ready`] to
    /// emit `ready`.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(MockInner {
                state: RendererState::Init,
                style: SurfaceStyle::default(),
                view: None,
                manual: false,
                calls: Vec::new(),
                written: Vec::new(),
                attach_waiter: None,
                detach_waiter: None,
            }),
            events,
        }
    }

    /// Create a renderer that is already `detached`
    pub fn ready() -> Self {
        let mock = Self::new();
        mock.lock().state = RendererState::Detached;
        mock
    }

    /// Create a renderer in `init` drawing with the given style
    pub fn with_style(style: SurfaceStyle) -> Self {
        let mock = Self::new();
        mock.lock().style = style;
        mock
    }

    pub fn style(&self) -> SurfaceStyle {
        self.lock().style
    }

    /// Hold attach/detach in their transitional states until finished
    pub fn set_manual(&self, manual: bool) {
        self.lock().manual = manual;
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RendererEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// `init` -> `detached`, emitting `ready`
    pub fn make_ready(&self) {
        {
            let mut inner = self.lock();
            if inner.state != RendererState::Init {
                return;
            }
            inner.state = RendererState::Detached;
        }
        debug!("mock renderer ready");
        self.emit(RendererEvent::Ready);
    }

    /// Complete a manual attach. Returns false if none is in flight.
    pub fn finish_attach(&self) -> bool {
        let waiter = {
            let mut inner = self.lock();
            if inner.state != RendererState::Attaching {
                return false;
            }
            inner.state = RendererState::Attached;
            inner.attach_waiter.take()
        };
        self.emit(RendererEvent::Attached);
        if let Some(waiter) = waiter {
            let _ = waiter.send(Ok(()));
        }
        true
    }

    /// Complete a manual detach. Returns false if none is in flight.
    pub fn finish_detach(&self) -> bool {
        let waiter = {
            let mut inner = self.lock();
            if inner.state != RendererState::Detaching {
                return false;
            }
            inner.state = RendererState::Detached;
            inner.view = None;
            inner.detach_waiter.take()
        };
        self.emit(RendererEvent::Detached);
        if let Some(waiter) = waiter {
            let _ = waiter.send(Ok(()));
        }
        true
    }

    /// Emit an `error` event without touching state
    pub fn emit_error(&self, message: &str) {
        self.emit(RendererEvent::Error(message.to_string()));
    }

    /// Fail like a native surface: drop to `detached` (unless still in
    /// `init`), reject the in-flight attach/detach and emit `error`.
    pub fn fail(&self, message: &str) {
        let waiters = {
            let mut inner = self.lock();
            if inner.state != RendererState::Init {
                inner.state = RendererState::Detached;
                inner.view = None;
            }
            [inner.attach_waiter.take(), inner.detach_waiter.take()]
        };
        warn!(message, "mock renderer failure");
        for waiter in waiters.into_iter().flatten() {
            let _ = waiter.send(Err(RendererError::new(message)));
        }
        self.emit_error(message);
    }

    pub fn resize(&self, columns: u16, rows: u16) {
        self.emit(RendererEvent::Resize { columns, rows });
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    /// Everything written so far, concatenated
    pub fn output(&self) -> String {
        self.lock().written.concat()
    }

    pub fn view(&self) -> Option<CoreView> {
        self.lock().view.clone()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn attach(&self, view: &CoreView) -> Result<(), RendererError> {
        let rx = {
            let mut inner = self.lock();
            inner.calls.push(MockCall::Attach(view.clone()));
            if inner.state != RendererState::Detached {
                return Err(RendererError::new("attach: must be in detached state"));
            }
            inner.view = Some(view.clone());
            if inner.manual {
                inner.state = RendererState::Attaching;
                let (tx, rx) = oneshot::channel();
                inner.attach_waiter = Some(tx);
                Some(rx)
            } else {
                inner.state = RendererState::Attached;
                None
            }
        };

        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(RendererError::new("attach abandoned"))),
            None => {
                self.emit(RendererEvent::Attached);
                Ok(())
            }
        }
    }

    async fn detach(&self) -> Result<(), RendererError> {
        let rx = {
            let mut inner = self.lock();
            inner.calls.push(MockCall::Detach);
            match inner.state {
                RendererState::Detached => None,
                RendererState::Attached if inner.manual => {
                    inner.state = RendererState::Detaching;
                    let (tx, rx) = oneshot::channel();
                    inner.detach_waiter = Some(tx);
                    Some(rx)
                }
                RendererState::Attached => {
                    inner.state = RendererState::Detached;
                    inner.view = None;
                    None
                }
                _ => return Err(RendererError::new("Attach/detach pending")),
            }
        };

        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(RendererError::new("detach abandoned"))),
            None => {
                self.emit(RendererEvent::Detached);
                Ok(())
            }
        }
    }

    fn state(&self) -> RendererState {
        self.lock().state
    }

    fn write(&self, text: &str) {
        self.lock().written.push(text.to_string());
    }

    fn subscribe(&self) -> broadcast::Receiver<RendererEvent> {
        self.events.subscribe()
    }
}
