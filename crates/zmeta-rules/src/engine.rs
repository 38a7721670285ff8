//! Rule engine: holds the active rule set and per-rule fire state.
//!
//! Reload builds a fresh `RuleSet` and publishes it with an atomic pointer
//! swap; evaluations in flight keep whichever set was current when they
//! started.  Cooldown and fire-count state is engine-local and resets only
//! on reload.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use crate::eval::{condition_matches, resolve};
use crate::model::{Alert, AlertLocation, Rule, RuleSet};
use crate::RuleError;

#[derive(Default)]
struct FireState {
    last_fire: HashMap<String, Instant>,
    fire_counts: HashMap<String, u64>,
}

pub struct RuleEngine {
    path: PathBuf,
    rules: RwLock<Arc<RuleSet>>,
    state: Mutex<FireState>,
}

impl RuleEngine {
    /// Create an engine with an empty rule set; call [`reload`](Self::reload)
    /// to load the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RuleEngine {
            path: path.into(),
            rules: RwLock::new(Arc::new(RuleSet::default())),
            state: Mutex::new(FireState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (Re)load the rule file and swap it in.  A missing file yields an
    /// empty set; a malformed file is an error and the previous set stays
    /// active.  Fire state resets on success.
    pub fn reload(&self) -> Result<usize, RuleError> {
        let set = if self.path.exists() {
            RuleSet::from_path(&self.path)?
        } else {
            RuleSet::default()
        };
        let count = set.len();
        *self.rules.write().expect("rule lock poisoned") = Arc::new(set);
        *self.state.lock().expect("fire-state lock poisoned") = FireState::default();
        Ok(count)
    }

    /// The currently-published rule set.
    pub fn current(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules.read().expect("rule lock poisoned"))
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.current().rules.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    pub fn fire_count(&self, rule: &str) -> u64 {
        self.state
            .lock()
            .expect("fire-state lock poisoned")
            .fire_counts
            .get(rule)
            .copied()
            .unwrap_or(0)
    }

    /// Evaluate every rule against a serialized event.  All matching rules
    /// fire in declaration order, each subject to its own cooldown.
    pub fn evaluate(&self, event: &Value) -> Vec<Alert> {
        self.evaluate_at(event, Instant::now())
    }

    /// Evaluation with an injected clock, for cooldown tests.
    pub fn evaluate_at(&self, event: &Value, now: Instant) -> Vec<Alert> {
        let set = self.current();
        let mut alerts = Vec::new();
        for rule in &set.rules {
            if !rule_matches(rule, event) {
                continue;
            }
            if !self.note_fire(rule, now) {
                continue;
            }
            alerts.push(build_alert(rule, event));
        }
        alerts
    }

    /// Apply the cooldown; returns false when the rule is still cooling
    /// down.  Records the fire time and count otherwise.
    fn note_fire(&self, rule: &Rule, now: Instant) -> bool {
        let mut state = self.state.lock().expect("fire-state lock poisoned");
        if let Some(cooldown) = rule.cooldown {
            if let Some(last) = state.last_fire.get(&rule.name) {
                if now.duration_since(*last) < cooldown {
                    return false;
                }
            }
        }
        state.last_fire.insert(rule.name.clone(), now);
        *state.fire_counts.entry(rule.name.clone()).or_insert(0) += 1;
        true
    }
}

fn rule_matches(rule: &Rule, event: &Value) -> bool {
    let mut results = rule
        .conditions
        .iter()
        .map(|condition| condition_matches(condition, event));
    if rule.any_match {
        results.any(|matched| matched)
    } else {
        results.all(|matched| matched)
    }
}

fn build_alert(rule: &Rule, event: &Value) -> Alert {
    let loc = AlertLocation {
        lat: resolve(event, "location.lat").and_then(Value::as_f64),
        lon: resolve(event, "location.lon").and_then(Value::as_f64),
    };
    Alert {
        kind: "alert".to_owned(),
        rule: rule.name.clone(),
        severity: rule.severity,
        message: rule.message.clone(),
        timestamp: event.get("timestamp").cloned(),
        loc,
        sensor_id: resolve(event, "sensor_id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        modality: resolve(event, "modality")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    }
}
