//! Console session
//!
//! Owns one renderer handle, redirects stdout/stderr through it and
//! serializes `display`/`hide` requests against the renderer's own
//! asynchronous lifecycle. At most one display request is pending at a
//! time; a second one is rejected instead of queued.
//!
//! Renderer events are handled by a single relay task, strictly in order:
//! bookkeeping first (parent view, stream geometry), then the armed
//! requests, then the session's own observers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::machine::{display_entry, hide_entry, transition, DisplayEntry, HideEntry, Phase, Step};
use crate::config::ConsoleOptions;
use crate::core::renderer::{Renderer, RendererEvent, RendererState};
use crate::core::view::CoreView;
use crate::error::{ConsoleError, RendererError, Result};
use crate::intercept::{OutputStream, StreamInterceptor};

/// Events re-emitted to session observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Attached,
    Detached,
    Error(String),
}

type Reply = oneshot::Sender<Result<()>>;

struct DisplayRequest {
    view: CoreView,
    phase: Phase,
    reply: Reply,
}

struct HideRequest {
    phase: Phase,
    reply: Reply,
}

#[derive(Default)]
struct Controller {
    /// View we are attached (or attaching) to
    parent: Option<CoreView>,
    /// A display request is armed and not yet handed to the renderer
    pending: bool,
    display: Option<DisplayRequest>,
    hide: Option<HideRequest>,
}

/// Renderer work decided under the controller lock, run after it
enum Action {
    Attach { view: CoreView, reply: Reply },
    DetachForDisplay,
    DetachForHide,
}

struct Shared {
    renderer: Arc<dyn Renderer>,
    controller: Mutex<Controller>,
    interceptor: StreamInterceptor,
    events: broadcast::Sender<ConsoleEvent>,
}

impl Shared {
    fn controller(&self) -> MutexGuard<'_, Controller> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_event(&self, event: &RendererEvent) -> Vec<Action> {
        let mut ctl = self.controller();

        match event {
            RendererEvent::Detached => {
                ctl.parent = None;
                self.interceptor.restore_size();
            }
            RendererEvent::Resize { columns, rows } => {
                self.interceptor.apply_size(*columns, *rows);
            }
            _ => {}
        }

        let mut actions = Vec::new();
        let mut display_detaching = false;

        if let Some(mut request) = ctl.display.take() {
            match transition(request.phase, event) {
                Step::Wait => ctl.display = Some(request),
                Step::Attach => {
                    debug!(view = ?request.view, "display: attaching");
                    ctl.parent = Some(request.view.clone());
                    ctl.pending = false;
                    actions.push(Action::Attach {
                        view: request.view,
                        reply: request.reply,
                    });
                }
                Step::Detach(next) => {
                    debug!(?next, "display: detaching before attach");
                    request.phase = next;
                    ctl.display = Some(request);
                    display_detaching = true;
                    actions.push(Action::DetachForDisplay);
                }
                Step::Resolve => {
                    ctl.pending = false;
                    let _ = request.reply.send(Ok(()));
                }
                Step::Reject(message) => {
                    warn!(%message, "display request failed");
                    ctl.pending = false;
                    let _ = request.reply.send(Err(RendererError::new(message).into()));
                }
            }
        }

        if let Some(mut request) = ctl.hide.take() {
            match transition(request.phase, event) {
                Step::Wait | Step::Attach => ctl.hide = Some(request),
                // One detach at a time; the display's detach and re-attach
                // come first and the hide detaches on the next `attached`
                Step::Detach(_) if display_detaching => {
                    debug!("hide: display is switching views, waiting for it to attach");
                    ctl.hide = Some(request);
                }
                Step::Detach(next) => {
                    debug!("hide: pending display attached, detaching");
                    request.phase = next;
                    ctl.hide = Some(request);
                    actions.push(Action::DetachForHide);
                }
                Step::Resolve => {
                    let _ = request.reply.send(Ok(()));
                }
                Step::Reject(message) => {
                    warn!(%message, "hide request failed");
                    let _ = request.reply.send(Err(RendererError::new(message).into()));
                }
            }
        }

        actions
    }

    fn relay_outward(&self, event: &RendererEvent) {
        let relayed = match event {
            RendererEvent::Attached => ConsoleEvent::Attached,
            RendererEvent::Detached => ConsoleEvent::Detached,
            RendererEvent::Error(message) => ConsoleEvent::Error(message.clone()),
            RendererEvent::Ready | RendererEvent::Resize { .. } => return,
        };
        // Nobody listening is fine
        let _ = self.events.send(relayed);
    }

    async fn run(&self, action: Action) {
        match action {
            Action::Attach { view, reply } => {
                let result = self.attach(&view).await;
                let _ = reply.send(result);
            }
            Action::DetachForDisplay => {
                if let Err(e) = self.renderer.detach().await {
                    self.fail_display(e);
                }
            }
            Action::DetachForHide => {
                if let Err(e) = self.renderer.detach().await {
                    self.fail_hide(e);
                }
            }
        }
    }

    /// Attach with `parent` already recorded; undo it on failure
    async fn attach(&self, view: &CoreView) -> Result<()> {
        match self.renderer.attach(view).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, ?view, "attach failed");
                let waiting_hide = {
                    let mut ctl = self.controller();
                    if ctl.parent.as_ref() == Some(view) {
                        ctl.parent = None;
                    }
                    take_waiting_hide(&mut ctl)
                };
                // That hide was waiting for this attach to land
                if let Some(hide) = waiting_hide {
                    let _ = hide.reply.send(Err(e.clone().into()));
                }
                Err(e.into())
            }
        }
    }

    fn fail_display(&self, error: RendererError) {
        warn!(%error, "display request failed");
        let (display, waiting_hide) = {
            let mut ctl = self.controller();
            let display = ctl.display.take();
            if display.is_some() {
                ctl.pending = false;
            }
            (display, take_waiting_hide(&mut ctl))
        };
        if let Some(request) = display {
            let _ = request.reply.send(Err(error.clone().into()));
        }
        // That hide was waiting for the display to land
        if let Some(hide) = waiting_hide {
            let _ = hide.reply.send(Err(error.into()));
        }
    }

    fn fail_hide(&self, error: RendererError) {
        warn!(%error, "hide request failed");
        if let Some(request) = self.controller().hide.take() {
            let _ = request.reply.send(Err(error.into()));
        }
    }

    /// Missed events may have included the one an armed request waits
    /// for. Fail those requests and resync the parent from the renderer.
    fn on_lagged(&self, skipped: u64) {
        let state = self.renderer.state();
        let (display, hide) = {
            let mut ctl = self.controller();
            if state == RendererState::Detached {
                ctl.parent = None;
                self.interceptor.restore_size();
            }
            ctl.pending = false;
            (ctl.display.take(), ctl.hide.take())
        };
        warn!(skipped, %state, "renderer events lagged");
        if let Some(request) = display {
            let _ = request.reply.send(Err(ConsoleError::EventsLost(skipped)));
        }
        if let Some(request) = hide {
            let _ = request.reply.send(Err(ConsoleError::EventsLost(skipped)));
        }
    }

    /// Drop armed requests; their callers see `Closed`
    fn close(&self) {
        let mut ctl = self.controller();
        ctl.display = None;
        ctl.hide = None;
        ctl.pending = false;
    }
}

/// Take a hide that is waiting for a display to attach
fn take_waiting_hide(ctl: &mut Controller) -> Option<HideRequest> {
    match ctl.hide.take() {
        Some(hide) if hide.phase == Phase::AwaitingHideAttached => Some(hide),
        other => {
            ctl.hide = other;
            None
        }
    }
}

async fn relay(shared: Arc<Shared>, mut events: broadcast::Receiver<RendererEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                shared.on_lagged(skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                debug!("renderer event stream closed");
                break;
            }
        };
        debug!(?event, "renderer event");

        let actions = shared.on_event(&event);
        shared.relay_outward(&event);
        for action in actions {
            shared.run(action).await;
        }
    }
    shared.close();
}

async fn settle(reply: oneshot::Receiver<Result<()>>) -> Result<()> {
    reply.await.unwrap_or(Err(ConsoleError::Closed))
}

/// A console that stdout/stderr flow through and that can be displayed on
/// a host view.
///
/// Must be created inside a tokio runtime; the relay task it spawns is
/// stopped when the session is dropped. Dropping a session does not
/// restore the streams, see [`ConsoleSession::restore_streams`].
pub struct ConsoleSession {
    shared: Arc<Shared>,
    relay: JoinHandle<()>,
}

impl ConsoleSession {
    /// Create a session redirecting the process stdout and stderr
    pub fn new(renderer: Arc<dyn Renderer>, options: ConsoleOptions) -> Result<Self> {
        Self::with_streams(renderer, options, OutputStream::stdout(), OutputStream::stderr())
    }

    /// Create a session redirecting the given streams
    pub fn with_streams(
        renderer: Arc<dyn Renderer>,
        options: ConsoleOptions,
        stdout: Arc<OutputStream>,
        stderr: Arc<OutputStream>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConsoleError::NoRuntime)?;

        // Subscribe before anything can emit
        let renderer_events = renderer.subscribe();

        let interceptor = StreamInterceptor::new(Arc::clone(&renderer), stdout, stderr);
        interceptor.install(options.transform_stdout.clone(), options.transform_stderr.clone());

        let (events, _) = broadcast::channel(64);
        let shared = Arc::new(Shared {
            renderer,
            controller: Mutex::new(Controller::default()),
            interceptor,
            events,
        });
        let relay = runtime.spawn(relay(Arc::clone(&shared), renderer_events));

        info!(state = %shared.renderer.state(), ?options, "console session created");
        Ok(Self { shared, relay })
    }

    /// Display the console on `view`, or on the default core view.
    ///
    /// Resolves once the renderer has attached. Rejects at once with
    /// [`ConsoleError::AlreadyPending`] while another display is pending.
    pub async fn display(&self, view: Option<CoreView>) -> Result<()> {
        let view = view.unwrap_or_else(CoreView::core);

        let (reply, detach_first) = {
            let mut ctl = self.shared.controller();
            if ctl.pending {
                warn!(?view, "display rejected: request already pending");
                return Err(ConsoleError::AlreadyPending);
            }

            let state = self.shared.renderer.state();
            let entry = display_entry(state, &view, ctl.parent.as_ref());
            debug!(%state, ?view, ?entry, "display");

            match entry {
                DisplayEntry::AlreadyThere => return Ok(()),
                DisplayEntry::AttachNow => {
                    ctl.parent = Some(view.clone());
                    (None, false)
                }
                DisplayEntry::Arm(phase) | DisplayEntry::DetachThenArm(phase) => {
                    let (tx, rx) = oneshot::channel();
                    ctl.pending = true;
                    ctl.display = Some(DisplayRequest {
                        view: view.clone(),
                        phase,
                        reply: tx,
                    });
                    (Some(rx), matches!(entry, DisplayEntry::DetachThenArm(_)))
                }
            }
        };

        let Some(reply) = reply else {
            return self.shared.attach(&view).await;
        };
        if detach_first {
            if let Err(e) = self.shared.renderer.detach().await {
                self.shared.fail_display(e);
            }
        }
        settle(reply).await
    }

    /// Hide (detach) the console.
    ///
    /// If a display is pending, waits for it to attach and then detaches.
    /// Rejects with [`ConsoleError::NotDisplayed`] when there is nothing
    /// to hide.
    pub async fn hide(&self) -> Result<()> {
        let (reply, detach_now) = {
            let mut ctl = self.shared.controller();
            if ctl.hide.is_some() {
                warn!("hide rejected: request already pending");
                return Err(ConsoleError::AlreadyPending);
            }

            let entry = hide_entry(ctl.pending, ctl.parent.is_some());
            debug!(?entry, "hide");

            let (phase, detach_now) = match entry {
                HideEntry::NotDisplayed => {
                    debug!("hide rejected: not displayed");
                    return Err(ConsoleError::NotDisplayed);
                }
                HideEntry::Arm(phase) => (phase, false),
                HideEntry::DetachNow(phase) => (phase, true),
            };
            let (tx, rx) = oneshot::channel();
            ctl.hide = Some(HideRequest { phase, reply: tx });
            (rx, detach_now)
        };

        if detach_now {
            if let Err(e) = self.shared.renderer.detach().await {
                self.shared.fail_hide(e);
            }
        }
        settle(reply).await
    }

    /// The view the console is attached (or attaching) to
    pub fn get_parent(&self) -> Option<CoreView> {
        self.shared.controller().parent.clone()
    }

    pub fn get_state(&self) -> RendererState {
        self.shared.renderer.state()
    }

    pub fn is_pending(&self) -> bool {
        self.shared.controller().pending
    }

    /// Observe `attached`, `detached` and `error`
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.shared.events.subscribe()
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.shared.renderer
    }

    pub fn stdout(&self) -> &Arc<OutputStream> {
        self.shared.interceptor.stdout()
    }

    pub fn stderr(&self) -> &Arc<OutputStream> {
        self.shared.interceptor.stderr()
    }

    /// Put the streams back the way they were before this session.
    ///
    /// Sessions chained on the same streams must be restored newest first.
    pub fn restore_streams(&self) -> bool {
        self.shared.interceptor.restore()
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::{MockCall, MockRenderer};
    use crate::intercept::StreamHooks;

    struct Fixture {
        mock: Arc<MockRenderer>,
        session: Arc<ConsoleSession>,
        stdout: Arc<OutputStream>,
        stderr: Arc<OutputStream>,
        stderr_log: Arc<Mutex<Vec<String>>>,
    }

    fn stream(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<OutputStream> {
        Arc::new(OutputStream::detached(
            name,
            StreamHooks::write_only(Arc::new(move |text: &str| {
                log.lock().unwrap().push(text.to_string())
            })),
            Some(80),
            Some(24),
        ))
    }

    fn fixture(mock: MockRenderer) -> Fixture {
        let mock = Arc::new(mock);
        let stderr_log = Arc::new(Mutex::new(Vec::new()));
        let stdout = stream("stdout", Arc::new(Mutex::new(Vec::new())));
        let stderr = stream("stderr", Arc::clone(&stderr_log));
        let renderer: Arc<dyn Renderer> = mock.clone();
        let session = ConsoleSession::with_streams(
            renderer,
            ConsoleOptions::default(),
            Arc::clone(&stdout),
            Arc::clone(&stderr),
        )
        .unwrap();
        Fixture {
            mock,
            session: Arc::new(session),
            stdout,
            stderr,
            stderr_log,
        }
    }

    /// Let the relay and spawned requests run
    async fn settle_tasks() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_display(
        session: &Arc<ConsoleSession>,
        view: &CoreView,
    ) -> JoinHandle<Result<()>> {
        let session = Arc::clone(session);
        let view = view.clone();
        tokio::spawn(async move { session.display(Some(view)).await })
    }

    fn spawn_hide(session: &Arc<ConsoleSession>) -> JoinHandle<Result<()>> {
        let session = Arc::clone(session);
        tokio::spawn(async move { session.hide().await })
    }

    #[tokio::test]
    async fn test_display_waits_for_ready() {
        let f = fixture(MockRenderer::new());
        let view = CoreView::new("main");

        let display = spawn_display(&f.session, &view);
        settle_tasks().await;
        assert!(f.session.is_pending());
        assert!(f.mock.calls().is_empty());

        f.mock.make_ready();
        display.await.unwrap().unwrap();
        assert!(!f.session.is_pending());
        assert_eq!(f.mock.calls(), vec![MockCall::Attach(view.clone())]);
        assert_eq!(f.session.get_parent(), Some(view));
        assert_eq!(f.session.get_state(), RendererState::Attached);
    }

    #[tokio::test]
    async fn test_display_while_pending_rejects() {
        let f = fixture(MockRenderer::new());
        let _first = spawn_display(&f.session, &CoreView::new("a"));
        settle_tasks().await;

        let err = f.session.display(Some(CoreView::new("b"))).await.unwrap_err();
        assert_eq!(err, ConsoleError::AlreadyPending);
        assert!(f.mock.calls().is_empty());
        assert_eq!(f.session.get_state(), RendererState::Init);
    }

    #[tokio::test]
    async fn test_display_default_view() {
        let f = fixture(MockRenderer::ready());
        f.session.display(None).await.unwrap();
        assert_eq!(f.session.get_parent(), Some(CoreView::core()));
    }

    #[tokio::test]
    async fn test_display_same_view_is_noop() {
        let f = fixture(MockRenderer::ready());
        let view = CoreView::new("main");

        f.session.display(Some(view.clone())).await.unwrap();
        f.session.display(Some(view.clone())).await.unwrap();
        assert_eq!(f.mock.calls(), vec![MockCall::Attach(view)]);
        assert!(!f.session.is_pending());
    }

    #[tokio::test]
    async fn test_display_other_view_detaches_then_attaches() {
        let f = fixture(MockRenderer::ready());
        let a = CoreView::new("a");
        let b = CoreView::new("b");

        f.session.display(Some(a.clone())).await.unwrap();
        f.session.display(Some(b.clone())).await.unwrap();
        assert_eq!(
            f.mock.calls(),
            vec![MockCall::Attach(a), MockCall::Detach, MockCall::Attach(b.clone())]
        );
        assert_eq!(f.session.get_parent(), Some(b));
        assert_eq!(f.session.get_state(), RendererState::Attached);
    }

    #[tokio::test]
    async fn test_display_while_attaching_elsewhere() {
        let f = fixture(MockRenderer::ready());
        f.mock.set_manual(true);
        let a = CoreView::new("a");
        let b = CoreView::new("b");

        let first = spawn_display(&f.session, &a);
        settle_tasks().await;
        assert_eq!(f.session.get_state(), RendererState::Attaching);

        let second = spawn_display(&f.session, &b);
        settle_tasks().await;
        assert!(f.session.is_pending());

        assert!(f.mock.finish_attach());
        first.await.unwrap().unwrap();
        settle_tasks().await;
        assert_eq!(f.session.get_state(), RendererState::Detaching);

        assert!(f.mock.finish_detach());
        settle_tasks().await;
        assert_eq!(f.session.get_state(), RendererState::Attaching);

        assert!(f.mock.finish_attach());
        second.await.unwrap().unwrap();
        assert_eq!(
            f.mock.calls(),
            vec![MockCall::Attach(a), MockCall::Detach, MockCall::Attach(b.clone())]
        );
        assert_eq!(f.session.get_parent(), Some(b));
    }

    #[tokio::test]
    async fn test_display_while_detaching() {
        let f = fixture(MockRenderer::ready());
        let a = CoreView::new("a");
        let b = CoreView::new("b");
        f.session.display(Some(a.clone())).await.unwrap();

        f.mock.set_manual(true);
        let hide = spawn_hide(&f.session);
        settle_tasks().await;
        assert_eq!(f.session.get_state(), RendererState::Detaching);

        let display = spawn_display(&f.session, &b);
        settle_tasks().await;
        assert!(f.session.is_pending());

        assert!(f.mock.finish_detach());
        hide.await.unwrap().unwrap();
        settle_tasks().await;
        assert!(f.mock.finish_attach());
        display.await.unwrap().unwrap();

        assert_eq!(
            f.mock.calls(),
            vec![MockCall::Attach(a), MockCall::Detach, MockCall::Attach(b.clone())]
        );
        assert_eq!(f.session.get_parent(), Some(b));
    }

    #[tokio::test]
    async fn test_hide_during_view_switch_detaches_one_at_a_time() {
        let f = fixture(MockRenderer::ready());
        f.mock.set_manual(true);
        let a = CoreView::new("a");
        let b = CoreView::new("b");

        let first = spawn_display(&f.session, &a);
        settle_tasks().await;
        let second = spawn_display(&f.session, &b);
        settle_tasks().await;
        let hide = spawn_hide(&f.session);
        settle_tasks().await;

        assert!(f.mock.finish_attach());
        first.await.unwrap().unwrap();
        settle_tasks().await;
        assert_eq!(f.mock.calls(), vec![MockCall::Attach(a.clone()), MockCall::Detach]);

        assert!(f.mock.finish_detach());
        settle_tasks().await;
        assert!(!hide.is_finished());
        assert_eq!(f.session.get_state(), RendererState::Attaching);

        assert!(f.mock.finish_attach());
        second.await.unwrap().unwrap();
        settle_tasks().await;
        assert_eq!(
            f.mock.calls(),
            vec![
                MockCall::Attach(a),
                MockCall::Detach,
                MockCall::Attach(b),
                MockCall::Detach
            ]
        );
        assert!(!hide.is_finished());
        assert_eq!(f.session.get_state(), RendererState::Detaching);

        assert!(f.mock.finish_detach());
        hide.await.unwrap().unwrap();
        assert_eq!(f.session.get_state(), RendererState::Detached);
        assert_eq!(f.session.get_parent(), None);
    }

    #[tokio::test]
    async fn test_lagged_events_fail_waiting_display() {
        let f = fixture(MockRenderer::new());
        let display = spawn_display(&f.session, &CoreView::new("main"));
        settle_tasks().await;
        assert!(f.session.is_pending());

        // Overrun the relay's queue before it gets to run
        for _ in 0..80 {
            f.mock.resize(100, 30);
        }
        f.mock.make_ready();

        let err = display.await.unwrap().unwrap_err();
        assert!(matches!(err, ConsoleError::EventsLost(_)));
        assert!(!f.session.is_pending());
        assert!(f.mock.calls().is_empty());

        // The session keeps working afterwards
        f.session.display(None).await.unwrap();
        assert_eq!(f.session.get_parent(), Some(CoreView::core()));
    }

    #[tokio::test]
    async fn test_lagged_events_resync_parent() {
        let f = fixture(MockRenderer::ready());
        f.session.display(Some(CoreView::new("main"))).await.unwrap();
        settle_tasks().await;

        // Detach behind the session's back and bury the event
        f.mock.detach().await.unwrap();
        for _ in 0..80 {
            f.mock.resize(100, 30);
        }
        settle_tasks().await;

        assert_eq!(f.session.get_parent(), None);
        assert_eq!(f.session.hide().await.unwrap_err(), ConsoleError::NotDisplayed);
    }

    #[tokio::test]
    async fn test_hide_when_not_displayed() {
        let f = fixture(MockRenderer::ready());
        assert_eq!(f.session.hide().await.unwrap_err(), ConsoleError::NotDisplayed);
        assert!(f.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hide_after_display_relays_events() {
        let f = fixture(MockRenderer::ready());
        let mut events = f.session.subscribe();
        let view = CoreView::new("main");

        f.session.display(Some(view.clone())).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), ConsoleEvent::Attached);

        f.session.hide().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), ConsoleEvent::Detached);
        assert_eq!(f.session.get_parent(), None);
        assert_eq!(f.session.get_state(), RendererState::Detached);
        assert_eq!(f.mock.calls(), vec![MockCall::Attach(view), MockCall::Detach]);

        assert_eq!(f.session.hide().await.unwrap_err(), ConsoleError::NotDisplayed);
    }

    #[tokio::test]
    async fn test_hide_while_pending_waits_for_attach() {
        let f = fixture(MockRenderer::new());
        let view = CoreView::new("main");

        let display = spawn_display(&f.session, &view);
        settle_tasks().await;
        let hide = spawn_hide(&f.session);
        settle_tasks().await;

        f.mock.make_ready();
        display.await.unwrap().unwrap();
        hide.await.unwrap().unwrap();
        assert_eq!(f.mock.calls(), vec![MockCall::Attach(view), MockCall::Detach]);
        assert_eq!(f.session.get_state(), RendererState::Detached);
        assert_eq!(f.session.get_parent(), None);
    }

    #[tokio::test]
    async fn test_error_rejects_waiting_requests() {
        let f = fixture(MockRenderer::new());
        let mut events = f.session.subscribe();

        let display = spawn_display(&f.session, &CoreView::new("main"));
        settle_tasks().await;
        let hide = spawn_hide(&f.session);
        settle_tasks().await;

        f.mock.emit_error("surface unavailable");
        let expected = ConsoleError::Renderer(RendererError::new("surface unavailable"));
        assert_eq!(display.await.unwrap().unwrap_err(), expected);
        assert_eq!(hide.await.unwrap().unwrap_err(), expected);
        assert_eq!(
            events.recv().await.unwrap(),
            ConsoleEvent::Error("surface unavailable".into())
        );
        assert!(!f.session.is_pending());
        assert!(f.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_attach_clears_parent() {
        let f = fixture(MockRenderer::ready());
        f.mock.set_manual(true);
        let view = CoreView::new("main");

        let display = spawn_display(&f.session, &view);
        settle_tasks().await;
        f.mock.fail("lost host view");

        let err = display.await.unwrap().unwrap_err();
        assert_eq!(err, ConsoleError::Renderer(RendererError::new("lost host view")));
        assert_eq!(f.session.get_parent(), None);
    }

    #[tokio::test]
    async fn test_resize_and_detach_restore_geometry() {
        let f = fixture(MockRenderer::ready());
        f.session.display(Some(CoreView::new("main"))).await.unwrap();

        f.mock.resize(120, 40);
        settle_tasks().await;
        assert_eq!((f.stdout.columns(), f.stdout.rows()), (Some(120), Some(40)));
        assert_eq!((f.stderr.columns(), f.stderr.rows()), (Some(120), Some(40)));

        f.session.hide().await.unwrap();
        assert_eq!((f.stdout.columns(), f.stdout.rows()), (Some(80), Some(24)));
        assert_eq!((f.stderr.columns(), f.stderr.rows()), (Some(80), Some(24)));
    }

    #[tokio::test]
    async fn test_writes_reach_surface_and_stream() {
        let f = fixture(MockRenderer::ready());
        f.session.stderr().write("hello");
        f.session.stdout().write("plain");
        f.session.stdout().move_cursor(3, -2);

        assert_eq!(
            f.mock.written(),
            vec!["\u{1b}[31mhello", "plain", "\u{1b}[3C\u{1b}[2A"]
        );
        assert_eq!(*f.stderr_log.lock().unwrap(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_chained_sessions() {
        let first = fixture(MockRenderer::ready());
        let second_mock = Arc::new(MockRenderer::ready());
        let renderer: Arc<dyn Renderer> = second_mock.clone();
        let second = ConsoleSession::with_streams(
            renderer,
            ConsoleOptions::default(),
            Arc::clone(&first.stdout),
            Arc::clone(&first.stderr),
        )
        .unwrap();

        first.stderr.write("oops");
        // Each session prefixes what it is handed, newest first
        assert_eq!(second_mock.written(), vec!["\u{1b}[31moops"]);
        assert_eq!(first.mock.written(), vec!["\u{1b}[31moops"]);
        assert_eq!(*first.stderr_log.lock().unwrap(), vec!["oops"]);

        assert!(!first.session.restore_streams());
        assert!(second.restore_streams());
        assert!(first.session.restore_streams());
    }

    #[test]
    fn test_requires_runtime() {
        let renderer: Arc<dyn Renderer> = Arc::new(MockRenderer::ready());
        let out = stream("stdout", Arc::new(Mutex::new(Vec::new())));
        let err = stream("stderr", Arc::new(Mutex::new(Vec::new())));
        let result = ConsoleSession::with_streams(renderer, ConsoleOptions::default(), out, err);
        assert!(matches!(result, Err(ConsoleError::NoRuntime)));
    }
}
