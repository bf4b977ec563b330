//! Console callbacks: one `ADD:` / `DEL:` / `MOD:` line per change on stdout

use owo_colors::{OwoColorize, Stream};
use pollmon_watcher::{Callbacks, EventKind};
use std::io::Write;
use std::path::Path;

/// Label printed for each kind
pub fn label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Add => "ADD",
        EventKind::Delete => "DEL",
        EventKind::Modify => "MOD",
    }
}

/// Plain `LABEL: path` line
pub fn format_event(kind: EventKind, path: &Path) -> String {
    render(label(kind), path)
}

fn render(label: &str, path: &Path) -> String {
    format!("{}: {}", label, path.display())
}

fn print_event(kind: EventKind, path: &Path) {
    let label = label(kind);
    let styled = match kind {
        EventKind::Add => label
            .if_supports_color(Stream::Stdout, |t| t.green())
            .to_string(),
        EventKind::Delete => label
            .if_supports_color(Stream::Stdout, |t| t.red())
            .to_string(),
        EventKind::Modify => label
            .if_supports_color(Stream::Stdout, |t| t.yellow())
            .to_string(),
    };

    // One locked write per line; a closed stdout is not worth a panic
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{}", render(&styled, path));
    let _ = out.flush();
}

/// Callbacks that print every change to stdout
pub fn console_callbacks() -> Callbacks {
    Callbacks::from_fn(print_event)
}
