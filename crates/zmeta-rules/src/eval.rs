//! Predicate evaluation against a serialized event.
//!
//! Numeric coercions never panic: a non-numeric operand makes the
//! condition false, not an error.

use serde_json::Value;

use crate::model::{Condition, Predicate};

/// Resolve a dotted path ("data.value.frequency_hz") against the event.
pub(crate) fn resolve<'a>(event: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = event;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub(crate) fn condition_matches(condition: &Condition, event: &Value) -> bool {
    let value = resolve(event, &condition.field);
    match &condition.predicate {
        Predicate::Eq(expected) => value == Some(expected),
        Predicate::In(allowed) => value.is_some_and(|v| allowed.contains(v)),
        Predicate::Between { lo, hi } => value
            .and_then(Value::as_f64)
            .is_some_and(|v| v >= *lo && v <= *hi),
        Predicate::Gte(bound) => value.and_then(Value::as_f64).is_some_and(|v| v >= *bound),
        Predicate::Lte(bound) => value.and_then(Value::as_f64).is_some_and(|v| v <= *bound),
        Predicate::Polygon(vertices) => value
            .and_then(as_point)
            .is_some_and(|(lat, lon)| point_in_polygon(lat, lon, vertices)),
    }
}

/// A polygon field resolves to a point by reading `lat`/`lon` from the
/// value (a location object, or anything shaped like one).
fn as_point(value: &Value) -> Option<(f64, f64)> {
    let object = value.as_object()?;
    let lat = object.get("lat")?.as_f64()?;
    let lon = object.get("lon")?.as_f64()?;
    Some((lat, lon))
}

/// Even-odd ray casting: a ray is cast in the +lon direction and edges
/// count when they strictly straddle the point's latitude.  Boundary points
/// land deterministically (bottom edges inside, top edges outside).  Fewer
/// than 3 vertices never contains anything.
pub(crate) fn point_in_polygon(lat: f64, lon: f64, vertices: &[(f64, f64)]) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (lat_i, lon_i) = vertices[i];
        let (lat_j, lon_j) = vertices[j];
        if ((lat_i > lat) != (lat_j > lat))
            && lon < (lon_j - lon_i) * (lat - lat_i) / (lat_j - lat_i) + lon_i
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
