//! Output formatting helpers for the `confsync` CLI.
//!
//! JSON output for scripting, and short human-readable state summaries with
//! the mode coloured by health.

use std::env;
use std::io::{self, Write};

use confsync_core::{StoreMode, StoreState};
use confsync_store::StoreStatus;
use owo_colors::OwoColorize;
use serde::Serialize;

// Ayu Dark palette.
const PASS: (u8, u8, u8) = (0xc2, 0xd9, 0x4c);
const WARN: (u8, u8, u8) = (0xff, 0xb4, 0x54);
const MUTED: (u8, u8, u8) = (0x6c, 0x76, 0x80);

/// Print `value` as pretty JSON on stdout.
pub fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // Ignore broken pipe errors (e.g., piped to `head`)
            let _ = writeln!(handle, "{}", json);
        }
        Err(e) => {
            eprintln!("Error: failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the state snapshot in the selected format.
pub fn print_state(json: bool, state: &StoreState) {
    if json {
        output_json(state);
    } else {
        println!("{}", render_state(state));
    }
}

/// Print the full status in the selected format.
pub fn print_status(json: bool, status: &StoreStatus) {
    if json {
        output_json(status);
        return;
    }

    println!("{}", render_state(&status.state));
    if !status.initialized {
        println!("{}", render_muted("(not initialized in this process)"));
    }
    println!("base:    {}", status.base_dir.display());
    println!("clone:   {}", status.clone_dir.display());
    println!();
    println!("tracked keys:");
    for entry in &status.keys {
        println!("  {}", entry.key);
        println!("    working  {}", entry.paths.working.display());
        println!("    mirror   {}", entry.paths.mirror.display());
        println!("    clone    {}", entry.paths.clone.display());
    }
}

/// Multi-line summary of a state snapshot.
pub fn render_state(state: &StoreState) -> String {
    let mut lines = vec![
        format!("mode:    {}", render_mode(state.mode)),
        format!("pending: {}", if state.pending { "yes" } else { "no" }),
        format!("branch:  {}", state.branch),
    ];
    if let Some(error) = &state.error {
        lines.push(format!("error:   {error}"));
    }
    lines.join("\n")
}

/// The mode name, green when ACTIVE, yellow when DEGRADED, muted when LOCAL.
pub fn render_mode(mode: StoreMode) -> String {
    let rgb = match mode {
        StoreMode::Active => PASS,
        StoreMode::Degraded => WARN,
        StoreMode::Local => MUTED,
    };
    color_str(mode.as_str(), rgb)
}

fn render_muted(s: &str) -> String {
    color_str(s, MUTED)
}

/// Applies truecolor foreground to a string, falling back to plain text
/// when color is not supported.
fn color_str(s: &str, rgb: (u8, u8, u8)) -> String {
    if supports_color() {
        s.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        s.to_string()
    }
}

/// Determines if ANSI color codes should be used.
///
/// `NO_COLOR` (any value), `CLICOLOR=0` and `TERM=dumb` disable color;
/// `CLICOLOR_FORCE` forces it. Otherwise color is used on a TTY only.
pub fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").as_deref() == Ok("0") {
        return false;
    }
    if env::var("TERM").as_deref() == Ok("dumb") {
        return false;
    }
    if env::var_os("CLICOLOR_FORCE").is_some() {
        return true;
    }
    crossterm::tty::IsTty::is_tty(&io::stdout())
}
