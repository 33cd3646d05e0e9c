use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    pub fn as_latlng(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationPrecision {
    Rooftop,
    RangeInterpolated,
    GeometricCenter,
    Approximate,
    Unspecified,
}

impl LocationPrecision {
    pub fn as_tag(&self) -> &'static str {
        match self {
            LocationPrecision::Rooftop => "ROOFTOP",
            LocationPrecision::RangeInterpolated => "RANGE_INTERPOLATED",
            LocationPrecision::GeometricCenter => "GEOMETRIC_CENTER",
            LocationPrecision::Approximate => "APPROXIMATE",
            LocationPrecision::Unspecified => "UNSPECIFIED",
        }
    }

    pub fn from_tag(value: &str) -> Self {
        match value {
            "ROOFTOP" => LocationPrecision::Rooftop,
            "RANGE_INTERPOLATED" => LocationPrecision::RangeInterpolated,
            "GEOMETRIC_CENTER" => LocationPrecision::GeometricCenter,
            "APPROXIMATE" => LocationPrecision::Approximate,
            _ => LocationPrecision::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    pub types: Vec<String>,
}

pub(crate) fn component_value(components: &[AddressComponent], kind: &str) -> Option<String> {
    components
        .iter()
        .find(|component| component.types.iter().any(|t| t == kind))
        .map(|component| component.long_name.clone())
}

#[derive(Debug, Clone)]
pub struct GeocodeCandidate {
    pub formatted_address: String,
    pub types: Vec<String>,
    pub location_type: LocationPrecision,
    pub components: Vec<AddressComponent>,
    pub place_id: Option<String>,
    pub location: Coordinate,
    pub plus_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlaceCandidate {
    pub name: Option<String>,
    pub place_id: Option<String>,
    pub types: Vec<String>,
    pub rating_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingMatch {
    pub name: Option<String>,
    pub place_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedAddress {
    pub formatted_address: String,
    pub street_number: Option<String>,
    pub route: Option<String>,
    pub subpremise: Option<String>,
    pub premise: Option<String>,
    pub neighborhood: Option<String>,
    pub locality: Option<String>,
    pub admin_area_level_1: Option<String>,
    pub admin_area_level_2: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub place_id: Option<String>,
    pub types: Vec<String>,
    pub location: Coordinate,
    pub location_type: LocationPrecision,
    pub plus_code: Option<String>,
    pub building_name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
}

impl NormalizedAddress {
    pub fn from_candidate(candidate: GeocodeCandidate) -> Self {
        let GeocodeCandidate {
            formatted_address,
            types,
            location_type,
            components,
            place_id,
            location,
            plus_code,
        } = candidate;
        Self {
            street_number: component_value(&components, "street_number"),
            route: component_value(&components, "route"),
            subpremise: component_value(&components, "subpremise"),
            premise: component_value(&components, "premise"),
            neighborhood: component_value(&components, "neighborhood"),
            locality: component_value(&components, "locality"),
            admin_area_level_1: component_value(&components, "administrative_area_level_1"),
            admin_area_level_2: component_value(&components, "administrative_area_level_2"),
            country: component_value(&components, "country"),
            postal_code: component_value(&components, "postal_code"),
            formatted_address,
            types,
            location,
            location_type,
            place_id,
            plus_code,
            building_name: None,
            address1: None,
            address2: None,
        }
    }
}
