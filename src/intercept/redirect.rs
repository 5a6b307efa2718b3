//! Stream redirection
//!
//! Wraps a stream's entry points so output is copied to a console surface
//! while the previous entry points still run. Installation is guarded by
//! the saved state: a stream is wrapped at most once per saved state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::ansi;
use super::stream::{ClearFn, MoveFn, OutputStream, StreamHooks, WriteFn};
use crate::core::renderer::Renderer;

/// Rewrites output before it reaches the surface, e.g. to add ANSI color
pub type Transform = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub fn identity() -> Transform {
    Arc::new(|text: &str| text.to_string())
}

/// Default stderr transform: prefix with red foreground
pub fn red_prefix() -> Transform {
    Arc::new(|text: &str| format!("{}{}", ansi::RED, text))
}

/// What a stream looked like before it was wrapped
#[derive(Default)]
pub struct SavedStreamState {
    write: Option<WriteFn>,
    clear_screen_down: Option<ClearFn>,
    move_cursor: Option<MoveFn>,
    transform: Option<Transform>,
    columns: Option<u16>,
    rows: Option<u16>,
    /// The wrapper we installed, to detect being wrapped in turn
    installed: Option<WriteFn>,
}

impl SavedStreamState {
    pub fn is_installed(&self) -> bool {
        self.write.is_some()
    }

    pub fn columns(&self) -> Option<u16> {
        self.columns
    }

    pub fn rows(&self) -> Option<u16> {
        self.rows
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }
}

fn same_fn<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Wrap `stream` so its output is also written to `surface`.
///
/// Returns false without touching anything if `saved` already holds a
/// write entry point.
pub fn redirect(
    stream: &OutputStream,
    saved: &mut SavedStreamState,
    surface: &Arc<dyn Renderer>,
    transform: Option<Transform>,
) -> bool {
    if saved.is_installed() {
        debug!(stream = stream.name(), "stream already redirected");
        return false;
    }

    let original = stream.hooks();
    let transform = transform.unwrap_or_else(identity);

    let write: WriteFn = {
        let surface = Arc::clone(surface);
        let transform = Arc::clone(&transform);
        let previous = Arc::clone(&original.write);
        Arc::new(move |output: &str| {
            surface.write(&transform(output));
            previous(output);
        })
    };

    let clear_screen_down: ClearFn = {
        let surface = Arc::clone(surface);
        let previous = original.clear_screen_down.clone();
        Arc::new(move || {
            surface.write(ansi::CLEAR_SCREEN_DOWN);
            if let Some(previous) = &previous {
                previous();
            }
        })
    };

    let move_cursor: MoveFn = {
        let surface = Arc::clone(surface);
        let previous = original.move_cursor.clone();
        Arc::new(move |col: i32, row: i32| {
            let sequence = ansi::cursor_move(col, row);
            if !sequence.is_empty() {
                surface.write(&sequence);
            }
            if let Some(previous) = &previous {
                previous(col, row);
            }
        })
    };

    *saved = SavedStreamState {
        write: Some(original.write),
        clear_screen_down: original.clear_screen_down,
        move_cursor: original.move_cursor,
        transform: Some(transform),
        columns: stream.columns(),
        rows: stream.rows(),
        installed: Some(Arc::clone(&write)),
    };

    stream.replace_hooks(StreamHooks {
        write,
        clear_screen_down: Some(clear_screen_down),
        move_cursor: Some(move_cursor),
    });
    debug!(stream = stream.name(), "stream redirected");
    true
}

/// Whether something replaced our wrapper after [`redirect`] installed it
fn wrapped_again(stream: &OutputStream, saved: &SavedStreamState) -> bool {
    match &saved.installed {
        Some(installed) => !same_fn(installed, &stream.hooks().write),
        None => false,
    }
}

/// Put back the entry points saved by [`redirect`].
///
/// Refuses (returns false) when another wrapper was installed on top of
/// ours since; that wrapper must be restored first.
pub fn restore(stream: &OutputStream, saved: &mut SavedStreamState) -> bool {
    let Some(write) = saved.write.clone() else {
        return false;
    };

    if wrapped_again(stream, saved) {
        warn!(
            stream = stream.name(),
            "stream was wrapped again after redirect; not restoring"
        );
        return false;
    }

    stream.replace_hooks(StreamHooks {
        write,
        clear_screen_down: saved.clear_screen_down.take(),
        move_cursor: saved.move_cursor.take(),
    });
    *saved = SavedStreamState::default();
    debug!(stream = stream.name(), "stream restored");
    true
}

struct Redirected {
    stream: Arc<OutputStream>,
    saved: Mutex<SavedStreamState>,
}

impl Redirected {
    fn new(stream: Arc<OutputStream>) -> Self {
        Self {
            stream,
            saved: Mutex::new(SavedStreamState::default()),
        }
    }

    fn saved(&self) -> MutexGuard<'_, SavedStreamState> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the stdout/stderr redirection of one console session
pub struct StreamInterceptor {
    surface: Arc<dyn Renderer>,
    stdout: Redirected,
    stderr: Redirected,
}

impl StreamInterceptor {
    pub fn new(
        surface: Arc<dyn Renderer>,
        stdout: Arc<OutputStream>,
        stderr: Arc<OutputStream>,
    ) -> Self {
        Self {
            surface,
            stdout: Redirected::new(stdout),
            stderr: Redirected::new(stderr),
        }
    }

    /// Redirect both streams. Stderr gets the red prefix unless a
    /// transform is given; stdout is passed through unchanged by default.
    pub fn install(&self, transform_stdout: Option<Transform>, transform_stderr: Option<Transform>) {
        self.redirect_stderr(Some(transform_stderr.unwrap_or_else(red_prefix)));
        self.redirect_stdout(transform_stdout);
    }

    pub fn redirect_stdout(&self, transform: Option<Transform>) -> bool {
        redirect(&self.stdout.stream, &mut self.stdout.saved(), &self.surface, transform)
    }

    pub fn redirect_stderr(&self, transform: Option<Transform>) -> bool {
        redirect(&self.stderr.stream, &mut self.stderr.saved(), &self.surface, transform)
    }

    /// Restore both streams; true only if both were restored.
    ///
    /// Either both streams are unwrapped or neither is: if one of them was
    /// wrapped again on top, nothing is touched.
    pub fn restore(&self) -> bool {
        let mut saved_out = self.stdout.saved();
        let mut saved_err = self.stderr.saved();
        if wrapped_again(&self.stdout.stream, &saved_out)
            || wrapped_again(&self.stderr.stream, &saved_err)
        {
            warn!("a stream was wrapped again after redirect; restoring neither");
            return false;
        }
        let out = restore(&self.stdout.stream, &mut saved_out);
        let err = restore(&self.stderr.stream, &mut saved_err);
        out && err
    }

    pub fn stdout(&self) -> &Arc<OutputStream> {
        &self.stdout.stream
    }

    pub fn stderr(&self) -> &Arc<OutputStream> {
        &self.stderr.stream
    }

    /// Geometry reported by the surface while attached
    pub fn apply_size(&self, columns: u16, rows: u16) {
        for redirected in [&self.stdout, &self.stderr] {
            redirected.stream.set_size(Some(columns), Some(rows));
        }
    }

    /// Back to the geometry captured at redirect time
    pub fn restore_size(&self) {
        for redirected in [&self.stdout, &self.stderr] {
            let saved = redirected.saved();
            if saved.is_installed() {
                redirected.stream.set_size(saved.columns, saved.rows);
            }
        }
    }
}
