//! Attribute keys and value parsing.
//!
//! Entity attributes live in the document plane as flat string key/value
//! pairs. This module names the keys the algorithms rely on and parses the
//! record-shaped values (nominal diameters, paired before/after values).

use regex::Regex;

/// Pipeline name the entity belongs to. `NA` marks an unreferenced group.
pub const ATTR_PIPELINE: &str = "pipeline";
/// Nominal diameter (primary value on transition fittings).
pub const ATTR_DN: &str = "dn";
/// Secondary nominal diameter (far-side value on reducers, branch DN on tees).
pub const ATTR_DN_SECONDARY: &str = "dn2";
/// Material / piping system (primary value on material transitions).
pub const ATTR_SYSTEM: &str = "system";
/// Secondary material (far-side value on material transitions).
pub const ATTR_SYSTEM_SECONDARY: &str = "system2";
/// Pipe series / type.
pub const ATTR_SERIES: &str = "series";
/// Stock-length zone override.
pub const ATTR_ZONE: &str = "zone";

/// Pipeline-name value marking entities with no authored reference curve.
pub const UNREFERENCED_GROUP: &str = "NA";

/// Parse a nominal diameter value. Accepts `200`, `DN200`, `DN 200`,
/// `200.0`.
pub fn parse_dn(raw: &str) -> Option<f64> {
    let re = Regex::new(r"^(?:DN\s*)?(\d+(?:\.\d+)?)$").ok()?;
    let caps = re.captures(raw.trim())?;
    caps[1].parse().ok()
}

/// Parse a paired value record like `DN200/DN150` into (before, after).
/// Single-valued inputs yield `(value, value)`.
pub fn parse_dn_pair(raw: &str) -> Option<(f64, f64)> {
    match raw.split_once('/') {
        Some((a, b)) => Some((parse_dn(a)?, parse_dn(b)?)),
        None => {
            let v = parse_dn(raw)?;
            Some((v, v))
        }
    }
}
