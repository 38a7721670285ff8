//! YAML-driven alerting rules evaluated against canonical events.
//!
//! # YAML Rule Schema
//!
//! ```yaml
//! rules:
//!   - name: rf_strong_signal
//!     enabled: true                 # default true
//!     severity: warn                # info | warn | crit, default info
//!     message: "Strong RF carrier"
//!     any: false                    # true = OR across conditions
//!     cooldown_seconds: 30          # optional per-rule re-fire floor
//!     conditions:
//!       - field: "data.value.frequency_hz"
//!         between: [902000000, 928000000]
//!       - field: "location"
//!         polygon: [[35.27, -78.64], [35.28, -78.64], [35.28, -78.63]]
//! ```
//!
//! Exactly one operator per condition.  Rules fire in declaration order;
//! all matching rules fire, each subject to its own cooldown.

mod engine;
mod eval;
mod model;

pub use engine::RuleEngine;
pub use model::{Alert, AlertLocation, Condition, Predicate, Rule, RuleSet, Severity};

/// Errors raised while loading a rule file.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("reading rule file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing rule file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },
}
