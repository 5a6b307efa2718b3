//! Display/hide protocol
//!
//! Pure decision tables for `display` and `hide`. Entry tables pick what a
//! new request does given the renderer's current state; [`transition`]
//! says what an armed request does when the renderer emits an event.
//! Nothing here touches the renderer, so races can be tested directly.

use crate::core::renderer::{RendererEvent, RendererState};
use crate::core::view::CoreView;

/// What an armed request is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// display: renderer still in `init`
    AwaitingReady,
    /// display: a detach is in progress, attach once it lands
    AwaitingDetachThenAttach,
    /// display: renderer is attaching elsewhere, detach once attached
    AwaitingAttachThenDetach,
    /// hide: a display is pending, detach once it attaches
    AwaitingHideAttached,
    /// hide: detach issued
    AwaitingHideDetached,
}

/// Reaction of an armed request to a renderer event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Not interesting; stay armed in the same phase
    Wait,
    /// Attach to the requested view
    Attach,
    /// Issue a detach and re-arm with the given phase
    Detach(Phase),
    Resolve,
    Reject(String),
}

pub fn transition(phase: Phase, event: &RendererEvent) -> Step {
    use Phase::*;
    use RendererEvent as Ev;

    match (phase, event) {
        (Idle, _) => Step::Wait,
        (_, Ev::Error(message)) => Step::Reject(message.clone()),
        (AwaitingReady, Ev::Ready) => Step::Attach,
        (AwaitingDetachThenAttach, Ev::Detached) => Step::Attach,
        (AwaitingAttachThenDetach, Ev::Attached) => Step::Detach(AwaitingDetachThenAttach),
        (AwaitingHideAttached, Ev::Attached) => Step::Detach(AwaitingHideDetached),
        (AwaitingHideDetached, Ev::Detached) => Step::Resolve,
        _ => Step::Wait,
    }
}

/// How a new `display` request starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEntry {
    /// Renderer is detached: attach right away
    AttachNow,
    /// Already attaching/attached to this view
    AlreadyThere,
    /// Mark pending and arm
    Arm(Phase),
    /// Mark pending, arm, then issue a detach
    DetachThenArm(Phase),
}

pub fn display_entry(
    state: RendererState,
    requested: &CoreView,
    parent: Option<&CoreView>,
) -> DisplayEntry {
    let same_view = parent == Some(requested);
    match state {
        RendererState::Init => DisplayEntry::Arm(Phase::AwaitingReady),
        RendererState::Detaching => DisplayEntry::Arm(Phase::AwaitingDetachThenAttach),
        RendererState::Attaching | RendererState::Attached if same_view => {
            DisplayEntry::AlreadyThere
        }
        RendererState::Attaching => DisplayEntry::Arm(Phase::AwaitingAttachThenDetach),
        RendererState::Attached => DisplayEntry::DetachThenArm(Phase::AwaitingDetachThenAttach),
        RendererState::Detached => DisplayEntry::AttachNow,
    }
}

/// How a new `hide` request starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideEntry {
    /// A display is pending: wait for it to attach, then detach
    Arm(Phase),
    /// Displayed: detach now and wait for `detached`
    DetachNow(Phase),
    NotDisplayed,
}

pub fn hide_entry(pending: bool, displayed: bool) -> HideEntry {
    if pending {
        HideEntry::Arm(Phase::AwaitingHideAttached)
    } else if displayed {
        HideEntry::DetachNow(Phase::AwaitingHideDetached)
    } else {
        HideEntry::NotDisplayed
    }
}
