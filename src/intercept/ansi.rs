//! Escape sequences written to the console surface

use std::fmt::Write;

/// Erase from cursor to end of screen (ED 0)
pub const CLEAR_SCREEN_DOWN: &str = "\x1b[0J";

/// SGR red foreground
pub const RED: &str = "\x1b[31m";

/// Relative cursor movement as CUF/CUB then CUD/CUU.
///
/// Zero deltas produce nothing.
pub fn cursor_move(col: i32, row: i32) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    if col > 0 {
        let _ = write!(out, "\x1b[{}C", col);
    } else if col < 0 {
        let _ = write!(out, "\x1b[{}D", col.unsigned_abs());
    }
    if row > 0 {
        let _ = write!(out, "\x1b[{}B", row);
    } else if row < 0 {
        let _ = write!(out, "\x1b[{}A", row.unsigned_abs());
    }
    out
}
