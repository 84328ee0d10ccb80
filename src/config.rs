use std::env;
use std::str::FromStr;

use log::warn;

use crate::blockchain::{DEFAULT_DIFFICULTY, DEFAULT_TIME_FORMAT, DIFF_MAX, DIFF_MIN};

/// Settings for the demo driver, read from the environment (and `.env`).
///
/// - `DIFFICULTY`: leading zero hex digits required (default 2, max 6)
/// - `TIME_FORMAT`: strftime layout for block timestamps
/// - `MINE_MAX_ATTEMPTS`: optional cap on hashes tried per block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub difficulty: usize,
    pub time_format: String,
    pub max_attempts: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            max_attempts: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; invalid values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let difficulty = parse_var(&lookup, "DIFFICULTY")
            .filter(|d| {
                let ok = (DIFF_MIN..=DIFF_MAX).contains(d);
                if !ok {
                    warn!("DIFFICULTY {d} outside {DIFF_MIN}..={DIFF_MAX}, using default");
                }
                ok
            })
            .unwrap_or(defaults.difficulty);

        let time_format = lookup("TIME_FORMAT")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(defaults.time_format);

        let max_attempts = parse_var(&lookup, "MINE_MAX_ATTEMPTS");

        Self {
            difficulty,
            time_format,
            max_attempts,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}
