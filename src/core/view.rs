//! CoreView - a host surface a renderer can attach to

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

static DEFAULT_CORE: Lazy<CoreView> = Lazy::new(|| CoreView::new("core"));

/// Handle to a host view.
///
/// Clones refer to the same view; equality is identity, not name.
#[derive(Clone)]
pub struct CoreView {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    id: u64,
    name: String,
}

impl CoreView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                id: NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
            }),
        }
    }

    /// The host's default core view, used when `display` gets no view
    pub fn core() -> Self {
        DEFAULT_CORE.clone()
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl PartialEq for CoreView {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CoreView {}

impl fmt::Debug for CoreView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoreView({}#{})", self.inner.name, self.inner.id)
    }
}
