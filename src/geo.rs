//! Proximity search over stored points.
//!
//! Distances are great-circle distances on a sphere with the mean Earth radius, which is
//! what PostGIS computes for `geography` when the spheroid is switched off. The memory
//! store uses [`haversine_meters`] with the same constant so both backends agree on what
//! "within R" means.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Mean Earth radius in meters (IUGG), as used by PostGIS sphere calculations.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

pub const METERS_PER_KM: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Result<Self, AppError> {
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::validation(format!(
                "Longitude {lng} is outside the range -180..180"
            )));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::validation(format!(
                "Latitude {lat} is outside the range -90..90"
            )));
        }
        Ok(Self { lng, lat })
    }

    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        haversine_meters(*self, *other)
    }
}

pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Clamp guards against h drifting a hair above 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// A validated "within radius" request. The radius is kept in meters; kilometers only
/// exist at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub center: GeoPoint,
    pub radius_meters: f64,
}

impl NearbyQuery {
    pub fn new(center: GeoPoint, radius_km: f64) -> Result<Self, AppError> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(AppError::validation(format!(
                "Distance must be a non-negative number of kilometers, got {radius_km}"
            )));
        }
        Ok(Self {
            center,
            radius_meters: radius_km * METERS_PER_KM,
        })
    }

    /// Builds a query from raw query-string values.
    pub fn from_params(
        lng: Option<&str>,
        lat: Option<&str>,
        distance_km: Option<&str>,
        default_distance_km: f64,
    ) -> Result<Self, AppError> {
        let (Some(lng), Some(lat)) = (non_blank(lng), non_blank(lat)) else {
            return Err(AppError::validation(
                "Please provide longitude and latitude coordinates",
            ));
        };

        let center = GeoPoint::new(parse_number("lng", lng)?, parse_number("lat", lat)?)?;
        let radius_km = match non_blank(distance_km) {
            Some(d) => parse_number("distance", d)?,
            None => default_distance_km,
        };

        Self::new(center, radius_km)
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center.distance_meters(point) <= self.radius_meters
    }
}

/// Keeps the items within the query radius, nearest first.
pub fn within<T, F>(items: impl IntoIterator<Item = T>, query: &NearbyQuery, point_of: F) -> Vec<T>
where
    F: Fn(&T) -> GeoPoint,
{
    let mut hits: Vec<(f64, T)> = items
        .into_iter()
        .map(|item| (query.center.distance_meters(&point_of(&item)), item))
        .filter(|(distance, _)| *distance <= query.radius_meters)
        .collect();

    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.into_iter().map(|(_, item)| item).collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(name: &str, raw: &str) -> Result<f64, AppError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::validation(format!("Invalid {name} value '{raw}'")))
}
