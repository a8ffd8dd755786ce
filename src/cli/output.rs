//! Output helpers shared by CLI subcommands.
//!
//! Global flags are propagated from `main` via `NETSIEVE_*` environment
//! variables so every module can check them without plumbing.

/// Whether `--json` was passed.
pub fn is_json() -> bool {
    std::env::var("NETSIEVE_JSON").is_ok()
}

/// Whether `--quiet` was passed.
pub fn is_quiet() -> bool {
    std::env::var("NETSIEVE_QUIET").is_ok()
}

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Minimal ANSI styling, disabled under `--no-color`.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            color: std::env::var("NETSIEVE_NO_COLOR").is_err(),
        }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "✓"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "!"
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
