//! Logging helpers for operator-supplied text (announcements, role names).
//! Keeps every log record on one line and bounds how much user text lands in logs.

/// Longest preview written to the log for a single value.
pub const MAX_PREVIEW: usize = 120;

/// Escape control characters for single-line logging and cap the length at
/// [`MAX_PREVIEW`] characters (an ellipsis marks truncation).
pub fn escape_log(s: &str) -> String {
    preview(s, MAX_PREVIEW)
}

/// Like [`escape_log`] with an explicit character budget.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
