//! Manufacturer stock-length configuration.
//!
//! JSON structure: `{ zone: { system: { series: { dn: stock_length } } } }`.
//! Spatial override zones (closed polygons) are resolved by the document
//! host before entities reach the core; here a zone is just the string
//! attribute already present on the entity, falling back to the default
//! zone.
//!
//! The table is an explicit service object passed into the algorithms that
//! need it; there is no module-level cache.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attrs::parse_dn;
use crate::error::DocumentError;

pub const DEFAULT_ZONE: &str = "default";

type SeriesMap = BTreeMap<String, BTreeMap<String, f64>>;
type SystemMap = BTreeMap<String, SeriesMap>;

/// Stock pipe lengths keyed by zone → system → series → DN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockTable {
    zones: BTreeMap<String, SystemMap>,
}

impl StockTable {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Look up the stock length for the given attributes.
    ///
    /// The zone falls back to [`DEFAULT_ZONE`] when the requested zone is
    /// absent or carries no entry for the system/series/DN triple. DN keys
    /// are matched numerically, so `"100"`, `"DN100"` and `"100.0"` agree.
    pub fn stock_length(
        &self,
        zone: Option<&str>,
        system: &str,
        series: &str,
        dn: f64,
    ) -> Option<f64> {
        let lookup = |zone_name: &str| -> Option<f64> {
            let series_map = self.zones.get(zone_name)?.get(system)?.get(series)?;
            series_map
                .iter()
                .find(|(key, _)| parse_dn(key).map_or(false, |k| (k - dn).abs() < 1e-9))
                .map(|(_, len)| *len)
        };

        match zone {
            Some(z) => lookup(z).or_else(|| lookup(DEFAULT_ZONE)),
            None => lookup(DEFAULT_ZONE),
        }
    }

    pub fn insert(&mut self, zone: &str, system: &str, series: &str, dn: &str, length: f64) {
        self.zones
            .entry(zone.to_string())
            .or_default()
            .entry(system.to_string())
            .or_default()
            .entry(series.to_string())
            .or_default()
            .insert(dn.to_string(), length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StockTable {
        let mut t = StockTable::default();
        t.insert(DEFAULT_ZONE, "Steel", "S1", "100", 12.0);
        t.insert(DEFAULT_ZONE, "Steel", "S1", "200", 16.0);
        t.insert("yard", "Steel", "S1", "100", 6.0);
        t
    }

    #[test]
    fn default_zone_lookup() {
        let t = table();
        assert_eq!(t.stock_length(None, "Steel", "S1", 100.0), Some(12.0));
        assert_eq!(t.stock_length(None, "Steel", "S1", 250.0), None);
    }

    #[test]
    fn zone_override_with_fallback() {
        let t = table();
        assert_eq!(t.stock_length(Some("yard"), "Steel", "S1", 100.0), Some(6.0));
        // Zone present but DN only in default zone.
        assert_eq!(t.stock_length(Some("yard"), "Steel", "S1", 200.0), Some(16.0));
        // Unknown zone falls back entirely.
        assert_eq!(t.stock_length(Some("nowhere"), "Steel", "S1", 100.0), Some(12.0));
    }

    #[test]
    fn json_round_trip() {
        let t = table();
        let json = serde_json::to_string(&t).unwrap();
        let back = StockTable::from_json(&json).unwrap();
        assert_eq!(t, back);
    }
}
