//! Rule, condition, and alert types plus YAML loading.
//!
//! Loading goes through raw serde structs and validates into the typed
//! forms: disabled rules are excluded, severities are checked, and each
//! condition must carry exactly one operator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::RuleError;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Crit,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Crit => "crit",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Conditions and rules
// ---------------------------------------------------------------------------

/// A single predicate applied to one dotted field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Deep equality against the resolved value.
    Eq(Value),
    /// Membership in a literal list.
    In(Vec<Value>),
    /// Numeric, inclusive on both ends.
    Between { lo: f64, hi: f64 },
    Gte(f64),
    Lte(f64),
    /// Point-in-polygon over `(lat, lon)` vertices, even-odd rule.
    Polygon(Vec<(f64, f64)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub severity: Severity,
    pub message: String,
    /// OR across conditions when true, AND otherwise.
    pub any_match: bool,
    /// Minimum interval between fires of this rule.
    pub cooldown: Option<Duration>,
    pub conditions: Vec<Condition>,
}

/// An ordered, validated set of enabled rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Alert position; serialized with explicit nulls so suppression keys can
/// distinguish "absent" from "zero".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AlertLocation {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A fired rule, as broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: String,
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: Option<Value>,
    pub loc: AlertLocation,
    pub sensor_id: Option<String>,
    pub modality: Option<String>,
}

impl Alert {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Raw YAML shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawRuleFile {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    name: Option<String>,
    enabled: Option<bool>,
    severity: Option<Severity>,
    message: Option<String>,
    #[serde(rename = "any")]
    any_match: Option<bool>,
    cooldown_seconds: Option<f64>,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    field: Option<String>,
    eq: Option<Value>,
    #[serde(rename = "in")]
    in_: Option<Vec<Value>>,
    between: Option<Vec<f64>>,
    gte: Option<f64>,
    lte: Option<f64>,
    polygon: Option<Vec<[f64; 2]>>,
}

impl RawCondition {
    fn into_condition(self, rule: &str) -> Result<Condition, RuleError> {
        let field = self.field.unwrap_or_default();
        let mut predicates = Vec::new();
        if let Some(v) = self.eq {
            predicates.push(Predicate::Eq(v));
        }
        if let Some(v) = self.in_ {
            predicates.push(Predicate::In(v));
        }
        if let Some(v) = self.between {
            let &[lo, hi] = v.as_slice() else {
                return Err(RuleError::InvalidRule {
                    rule: rule.to_owned(),
                    reason: format!("between on '{field}' needs exactly [lo, hi]"),
                });
            };
            predicates.push(Predicate::Between { lo, hi });
        }
        if let Some(v) = self.gte {
            predicates.push(Predicate::Gte(v));
        }
        if let Some(v) = self.lte {
            predicates.push(Predicate::Lte(v));
        }
        if let Some(v) = self.polygon {
            predicates.push(Predicate::Polygon(
                v.into_iter().map(|[lat, lon]| (lat, lon)).collect(),
            ));
        }
        match predicates.len() {
            1 => Ok(Condition {
                field,
                predicate: predicates.into_iter().next().unwrap(),
            }),
            0 => Err(RuleError::InvalidRule {
                rule: rule.to_owned(),
                reason: format!("condition on '{field}' has no operator"),
            }),
            _ => Err(RuleError::InvalidRule {
                rule: rule.to_owned(),
                reason: format!("condition on '{field}' has more than one operator"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl RuleSet {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RuleError> {
        let raw: RawRuleFile = serde_yaml::from_str(yaml)?;
        let mut rules = Vec::with_capacity(raw.rules.len());
        for item in raw.rules {
            if !item.enabled.unwrap_or(true) {
                continue;
            }
            let name = item.name.unwrap_or_else(|| "unnamed".to_owned());
            let mut conditions = Vec::with_capacity(item.conditions.len());
            for raw_condition in item.conditions {
                conditions.push(raw_condition.into_condition(&name)?);
            }
            rules.push(Rule {
                severity: item.severity.unwrap_or(Severity::Info),
                message: item.message.unwrap_or_default(),
                any_match: item.any_match.unwrap_or(false),
                cooldown: item.cooldown_seconds.map(Duration::from_secs_f64),
                conditions,
                name,
            });
        }
        Ok(RuleSet { rules })
    }

    pub fn from_path(path: &Path) -> Result<Self, RuleError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
