//! Shared output helpers for CLI commands.
//!
//! Global flags are passed down through environment variables so every
//! command can check them without threading arguments.

pub const JSON_ENV: &str = "SKINFORGE_JSON";
pub const QUIET_ENV: &str = "SKINFORGE_QUIET";
pub const VERBOSE_ENV: &str = "SKINFORGE_VERBOSE";
pub const NO_COLOR_ENV: &str = "SKINFORGE_NO_COLOR";

fn flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

/// Machine-readable output requested.
pub fn is_json() -> bool {
    flag(JSON_ENV)
}

/// Human output suppressed (also implied by `--json`).
pub fn is_quiet() -> bool {
    flag(QUIET_ENV) || is_json()
}

pub fn is_verbose() -> bool {
    flag(VERBOSE_ENV)
}

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to encode JSON output: {e}"),
    }
}

/// Status symbols, plain when colour is off.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            color: !flag(NO_COLOR_ENV) && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "[OK]"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "[!!]"
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
