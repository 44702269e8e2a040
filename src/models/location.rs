use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    #[default]
    Point,
}

/// GeoJSON-style point with a human readable address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default)]
    pub kind: PointKind,
    /// `[lng, lat]`
    pub coordinates: [f64; 2],
    pub address: String,
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lng: self.coordinates[0],
            lat: self.coordinates[1],
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LocationPayload {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "parse_coordinates")]
    pub coordinates: Option<Vec<f64>>,
    pub address: Option<String>,
}

impl LocationPayload {
    pub fn validate(self) -> Result<Location, AppError> {
        if let Some(kind) = self.kind.as_deref() {
            if kind != "Point" {
                return Err(AppError::validation(format!(
                    "Unsupported location type '{kind}', expected Point"
                )));
            }
        }

        let coordinates = self
            .coordinates
            .ok_or_else(|| AppError::validation("Please add location coordinates"))?;
        let &[lng, lat] = coordinates.as_slice() else {
            return Err(AppError::validation(
                "Location coordinates must be a [longitude, latitude] pair",
            ));
        };
        let point = GeoPoint::new(lng, lat)?;

        let address = super::required_text(self.address, "Please add an address")?;

        Ok(Location {
            kind: PointKind::Point,
            coordinates: [point.lng, point.lat],
            address,
        })
    }
}

/// Accepts numbers or numeric strings, the way form posts tend to send them.
fn parse_coordinates<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<Vec<StringOrFloat>> = Option::deserialize(deserializer)?;
    v.map(|items| {
        items
            .into_iter()
            .map(|item| match item {
                StringOrFloat::Float(f) => Ok(f),
                StringOrFloat::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
            })
            .collect()
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> LocationPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_location() {
        let loc = payload(r#"{"coordinates":[-80.19,25.76],"address":"Miami, FL"}"#)
            .validate()
            .unwrap();
        assert_eq!(loc.coordinates, [-80.19, 25.76]);
        assert_eq!(loc.kind, PointKind::Point);
        assert_eq!(loc.point(), GeoPoint { lng: -80.19, lat: 25.76 });
    }

    #[test]
    fn test_string_coordinates_are_parsed() {
        let loc = payload(r#"{"coordinates":["-80.19"," 25.76"],"address":"Miami"}"#)
            .validate()
            .unwrap();
        assert_eq!(loc.coordinates, [-80.19, 25.76]);
    }

    #[test]
    fn test_missing_parts_are_rejected() {
        assert!(payload(r#"{"address":"Miami"}"#).validate().is_err());
        assert!(payload(r#"{"coordinates":[1.0,2.0]}"#).validate().is_err());
        assert!(payload(r#"{"coordinates":[1.0,2.0],"address":"   "}"#)
            .validate()
            .is_err());
        assert!(payload(r#"{"coordinates":[1.0],"address":"x"}"#).validate().is_err());
        assert!(payload(r#"{"coordinates":[1.0,2.0,3.0],"address":"x"}"#)
            .validate()
            .is_err());
    }

    #[test]
    fn test_out_of_range_and_wrong_type() {
        assert!(payload(r#"{"coordinates":[25.76,-190.0],"address":"x"}"#)
            .validate()
            .is_err());
        assert!(payload(r#"{"type":"Polygon","coordinates":[1.0,2.0],"address":"x"}"#)
            .validate()
            .is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let loc = Location {
            kind: PointKind::Point,
            coordinates: [1.0, 2.0],
            address: "Somewhere".into(),
        };
        let value = serde_json::to_value(&loc).unwrap();
        assert_eq!(value["type"], "Point");
        assert_eq!(value["coordinates"][1], 2.0);
    }
}
