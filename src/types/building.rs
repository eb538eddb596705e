use std::collections::BTreeMap;

use geo::MultiPolygon;

/// Optional tags carried by a building footprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildingAttributes {
    pub levels: Option<u32>,
    pub kind: Option<String>,  // e.g. "residential", "house", "yes"
    pub name: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl BuildingAttributes {
    /// Parse a levels tag ("3", "3.0", " 4 "); anything non-positive or unparseable is `None`.
    pub fn parse_levels(raw: &str) -> Option<u32> {
        let value: f64 = raw.trim().parse().ok()?;
        (value.is_finite() && value >= 1.0).then(|| value.round() as u32)
    }
}

/// The ground-plan polygon of a structure plus its attributes.
///
/// Derived values (area, centroid, population, features) are kept in separate
/// outputs keyed by `id`; the footprint itself is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    id: String,
    geometry: MultiPolygon<f64>,
    attributes: BuildingAttributes,
}

impl Building {
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self { id: id.into(), geometry, attributes: BuildingAttributes::default() }
    }

    pub fn with_attributes(mut self, attributes: BuildingAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[inline] pub fn id(&self) -> &str { &self.id }
    #[inline] pub fn geometry(&self) -> &MultiPolygon<f64> { &self.geometry }
    #[inline] pub fn attributes(&self) -> &BuildingAttributes { &self.attributes }
}

#[cfg(test)]
mod tests {
    use super::BuildingAttributes;

    #[test]
    fn parse_levels() {
        assert_eq!(BuildingAttributes::parse_levels("3"), Some(3));
        assert_eq!(BuildingAttributes::parse_levels(" 4.0 "), Some(4));
        assert_eq!(BuildingAttributes::parse_levels("0"), None);
        assert_eq!(BuildingAttributes::parse_levels("-2"), None);
        assert_eq!(BuildingAttributes::parse_levels("many"), None);
    }
}
