//! Ephemeral credential helper for remote git operations.
//!
//! git asks `$GIT_ASKPASS` for a username and a password when a remote needs
//! authentication. [`Askpass`] writes a tiny shell script answering those
//! prompts into a fresh temporary directory (owner-only permissions) and
//! removes it when dropped, so the token never appears in an argument list
//! and never outlives the invocation it was created for.

use confsync_core::Credential;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempDir;

use crate::commands::GitCommand;

/// File name of the helper inside its temporary directory.
const SCRIPT_NAME: &str = "askpass.sh";

/// Prefix of the temporary directory created under the base directory.
const DIR_PREFIX: &str = ".askpass-";

/// A credential helper script that lives as long as this guard.
#[derive(Debug)]
pub struct Askpass {
    dir: TempDir,
}

impl Askpass {
    /// Write a helper answering prompts with `credential` into a new
    /// temporary directory below `parent`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory or script cannot be
    /// created.
    pub fn create(parent: &Path, credential: &Credential) -> io::Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix(DIR_PREFIX).tempdir_in(parent)?;

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o700);
        }

        let mut file = options.open(dir.path().join(SCRIPT_NAME))?;
        file.write_all(render_script(credential).as_bytes())?;
        file.sync_all()?;

        Ok(Self { dir })
    }

    /// Path of the helper script.
    pub fn script_path(&self) -> std::path::PathBuf {
        self.dir.path().join(SCRIPT_NAME)
    }

    /// Point `command` at this helper and forbid terminal prompting.
    pub fn apply(&self, command: GitCommand) -> GitCommand {
        command
            .env("GIT_ASKPASS", self.script_path())
            .env("GIT_TERMINAL_PROMPT", "0")
    }
}

/// The helper's shell source.
///
/// Prompts starting with `Username` get the username; every other prompt
/// gets the token.
pub fn render_script(credential: &Credential) -> String {
    format!(
        "#!/bin/sh\ncase \"$1\" in\n  Username*) printf '%s\\n' {} ;;\n  *) printf '%s\\n' {} ;;\nesac\n",
        shell_quote(credential.username()),
        shell_quote(credential.token()),
    )
}

/// Quote `value` for a POSIX shell single-quoted string.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
