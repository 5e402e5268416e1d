//! Monitored locations and the static province registry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dutch cities with their province, used to enrich normalized records
const PROVINCES: &[(&str, &str)] = &[
    ("Amsterdam", "Noord-Holland"),
    ("Rotterdam", "Zuid-Holland"),
    ("Den Haag", "Zuid-Holland"),
    ("Utrecht", "Utrecht"),
    ("Eindhoven", "Noord-Brabant"),
    ("Groningen", "Groningen"),
    ("Tilburg", "Noord-Brabant"),
    ("Almere", "Flevoland"),
    ("Breda", "Noord-Brabant"),
    ("Nijmegen", "Gelderland"),
    ("Arnhem", "Gelderland"),
    ("Haarlem", "Noord-Holland"),
    ("Enschede", "Overijssel"),
    ("Zwolle", "Overijssel"),
    ("Leeuwarden", "Friesland"),
    ("Maastricht", "Limburg"),
    ("Middelburg", "Zeeland"),
    ("Assen", "Drenthe"),
    ("Lelystad", "Flevoland"),
    ("'s-Hertogenbosch", "Noord-Brabant"),
];

/// Locations monitored when the configuration does not list any
pub const DEFAULT_LOCATIONS: &[&str] = &[
    "Amsterdam",
    "Rotterdam",
    "Den Haag",
    "Utrecht",
    "Eindhoven",
    "Groningen",
    "Tilburg",
    "Almere",
    "Breda",
    "Nijmegen",
    "Arnhem",
    "Haarlem",
];

/// Look up the province of a city, ignoring case and surrounding whitespace
#[must_use]
pub fn province_for(name: &str) -> Option<&'static str> {
    let name = name.trim();
    PROVINCES
        .iter()
        .find(|(city, _)| city.eq_ignore_ascii_case(name))
        .map(|(_, province)| *province)
}

/// One monitored place; the unit of concurrent work
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// City name as understood by the data provider
    pub name: String,
    /// Province, when the name is in the registry
    pub province: Option<String>,
}

impl Location {
    /// Create a new location, resolving its province from the registry
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let province = province_for(&name).map(str::to_string);
        Self { name, province }
    }

    /// Build the fixed registry for a run from configured names
    #[must_use]
    pub fn registry<S: AsRef<str>>(names: &[S]) -> Vec<Location> {
        names.iter().map(|n| Location::new(n.as_ref())).collect()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Amsterdam", Some("Noord-Holland"))]
    #[case("groningen", Some("Groningen"))]
    #[case("  Rotterdam ", Some("Zuid-Holland"))]
    #[case("'s-Hertogenbosch", Some("Noord-Brabant"))]
    #[case("Atlantis", None)]
    fn test_province_lookup(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(province_for(name), expected);
    }

    #[test]
    fn test_location_resolves_province() {
        let location = Location::new("Utrecht");
        assert_eq!(location.province.as_deref(), Some("Utrecht"));
        assert_eq!(location.to_string(), "Utrecht");
    }

    #[test]
    fn test_default_registry_is_fully_mapped() {
        let registry = Location::registry(DEFAULT_LOCATIONS);
        assert_eq!(registry.len(), DEFAULT_LOCATIONS.len());
        assert!(registry.iter().all(|l| l.province.is_some()));
    }
}
