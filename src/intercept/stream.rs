//! OutputStream
//!
//! A process output stream whose `write`, `clear_screen_down` and
//! `move_cursor` entry points can be swapped at runtime, plus the
//! column/row geometry consumers read from it.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::cursor::{MoveDown, MoveLeft, MoveRight, MoveUp};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::tty::IsTty;
use crossterm::{execute, queue};
use once_cell::sync::Lazy;

pub type WriteFn = Arc<dyn Fn(&str) + Send + Sync>;
pub type ClearFn = Arc<dyn Fn() + Send + Sync>;
pub type MoveFn = Arc<dyn Fn(i32, i32) + Send + Sync>;

/// Current entry points of a stream
#[derive(Clone)]
pub struct StreamHooks {
    pub write: WriteFn,
    /// Absent on streams that are not terminals
    pub clear_screen_down: Option<ClearFn>,
    pub move_cursor: Option<MoveFn>,
}

impl StreamHooks {
    /// Hooks with only a write entry point
    pub fn write_only(write: WriteFn) -> Self {
        Self {
            write,
            clear_screen_down: None,
            move_cursor: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Geometry {
    columns: Option<u16>,
    rows: Option<u16>,
}

pub struct OutputStream {
    name: &'static str,
    hooks: Mutex<StreamHooks>,
    geometry: Mutex<Geometry>,
}

static STDOUT: Lazy<Arc<OutputStream>> = Lazy::new(|| Arc::new(OutputStream::terminal_stdout()));
static STDERR: Lazy<Arc<OutputStream>> = Lazy::new(|| Arc::new(OutputStream::terminal_stderr()));

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OutputStream {
    /// Create a stream that is not tied to the process
    pub fn detached(
        name: &'static str,
        hooks: StreamHooks,
        columns: Option<u16>,
        rows: Option<u16>,
    ) -> Self {
        Self {
            name,
            hooks: Mutex::new(hooks),
            geometry: Mutex::new(Geometry { columns, rows }),
        }
    }

    /// Process-wide standard output
    pub fn stdout() -> Arc<OutputStream> {
        Arc::clone(&STDOUT)
    }

    /// Process-wide standard error
    pub fn stderr() -> Arc<OutputStream> {
        Arc::clone(&STDERR)
    }

    fn terminal_stdout() -> Self {
        let tty = io::stdout().is_tty();
        let write: WriteFn = Arc::new(|text: &str| {
            let mut out = io::stdout().lock();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        });
        let hooks = if tty {
            StreamHooks {
                write,
                clear_screen_down: Some(Arc::new(|| {
                    let mut out = io::stdout();
                    let _ = execute!(out, Clear(ClearType::FromCursorDown));
                })),
                move_cursor: Some(Arc::new(|col, row| {
                    let _ = move_terminal_cursor(&mut io::stdout(), col, row);
                })),
            }
        } else {
            StreamHooks::write_only(write)
        };
        Self::from_terminal("stdout", hooks, tty)
    }

    fn terminal_stderr() -> Self {
        let tty = io::stderr().is_tty();
        let write: WriteFn = Arc::new(|text: &str| {
            let mut err = io::stderr().lock();
            let _ = err.write_all(text.as_bytes());
            let _ = err.flush();
        });
        let hooks = if tty {
            StreamHooks {
                write,
                clear_screen_down: Some(Arc::new(|| {
                    let mut out = io::stderr();
                    let _ = execute!(out, Clear(ClearType::FromCursorDown));
                })),
                move_cursor: Some(Arc::new(|col, row| {
                    let _ = move_terminal_cursor(&mut io::stderr(), col, row);
                })),
            }
        } else {
            StreamHooks::write_only(write)
        };
        Self::from_terminal("stderr", hooks, tty)
    }

    fn from_terminal(name: &'static str, hooks: StreamHooks, tty: bool) -> Self {
        let (columns, rows) = if tty {
            terminal::size()
                .map(|(c, r)| (Some(c), Some(r)))
                .unwrap_or((None, None))
        } else {
            (None, None)
        };
        Self::detached(name, hooks, columns, rows)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn write(&self, text: &str) {
        // Clone the hook so no lock is held while it runs
        let write = Arc::clone(&lock(&self.hooks).write);
        write(text);
    }

    pub fn clear_screen_down(&self) {
        let clear = lock(&self.hooks).clear_screen_down.clone();
        if let Some(clear) = clear {
            clear();
        }
    }

    /// Move the cursor relative to its position; positive is right/down
    pub fn move_cursor(&self, col: i32, row: i32) {
        let move_cursor = lock(&self.hooks).move_cursor.clone();
        if let Some(move_cursor) = move_cursor {
            move_cursor(col, row);
        }
    }

    pub fn hooks(&self) -> StreamHooks {
        lock(&self.hooks).clone()
    }

    /// Install new entry points, returning the previous ones
    pub fn replace_hooks(&self, hooks: StreamHooks) -> StreamHooks {
        std::mem::replace(&mut *lock(&self.hooks), hooks)
    }

    pub fn columns(&self) -> Option<u16> {
        lock(&self.geometry).columns
    }

    pub fn rows(&self) -> Option<u16> {
        lock(&self.geometry).rows
    }

    pub fn set_size(&self, columns: Option<u16>, rows: Option<u16>) {
        *lock(&self.geometry) = Geometry { columns, rows };
    }
}

fn move_terminal_cursor<W: Write>(out: &mut W, col: i32, row: i32) -> io::Result<()> {
    let clamp = |n: i32| u16::try_from(n.unsigned_abs()).unwrap_or(u16::MAX);
    if col > 0 {
        queue!(out, MoveRight(clamp(col)))?;
    } else if col < 0 {
        queue!(out, MoveLeft(clamp(col)))?;
    }
    if row > 0 {
        queue!(out, MoveDown(clamp(row)))?;
    } else if row < 0 {
        queue!(out, MoveUp(clamp(row)))?;
    }
    out.flush()
}
