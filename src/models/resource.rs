use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::{Location, LocationPayload};
use super::{optional_enum, optional_text, required_enum, required_text};
use crate::db::Document;
use crate::error::AppError;
use crate::geo::GeoPoint;

text_enum!(ResourceType, "resource type", {
    Food,
    Water,
    Shelter,
    Medical,
    Equipment,
    Other,
});

text_enum!(ResourceStatus, "resource status", { Available, Reserved, Depleted });

/// Supplies and facilities registered by responders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(alias = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub quantity: f64,
    pub unit: String,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ResourceStatus,
    pub created_by: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn create(new: NewResource, created_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            resource_type: new.resource_type,
            quantity: new.quantity,
            unit: new.unit,
            location: new.location,
            description: new.description,
            status: new.status,
            created_by: created_by.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Resource {
    type Filter = ResourceFilter;
    const LABEL: &'static str = "Resource";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn created_by(&self) -> &str {
        &self.created_by
    }

    fn point(&self) -> GeoPoint {
        self.location.point()
    }

    fn matches(&self, filter: &ResourceFilter) -> bool {
        filter.status.map_or(true, |s| s == self.status)
            && filter.resource_type.map_or(true, |t| t == self.resource_type)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePayload {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub location: Option<LocationPayload>,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewResource {
    pub name: String,
    pub resource_type: ResourceType,
    pub quantity: f64,
    pub unit: String,
    pub location: Location,
    pub description: Option<String>,
    pub status: ResourceStatus,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub location: Option<Location>,
    pub description: Option<String>,
    pub status: Option<ResourceStatus>,
}

fn check_quantity(quantity: f64) -> Result<f64, AppError> {
    if quantity.is_finite() && quantity >= 0.0 {
        Ok(quantity)
    } else {
        Err(AppError::validation(format!(
            "Quantity must be a non-negative number, got {quantity}"
        )))
    }
}

impl ResourcePayload {
    pub fn into_new(self) -> Result<NewResource, AppError> {
        let quantity = self
            .quantity
            .ok_or_else(|| AppError::validation("Please specify the quantity"))?;

        Ok(NewResource {
            name: required_text(self.name, "Please add a name")?,
            resource_type: required_enum(self.resource_type, "Please specify the resource type")?,
            quantity: check_quantity(quantity)?,
            unit: required_text(self.unit, "Please specify the unit of measurement")?,
            location: self
                .location
                .ok_or_else(|| AppError::validation("Please add a location"))?
                .validate()?,
            // Description is free text and may be blank.
            description: self.description,
            status: optional_enum(self.status)?.unwrap_or(ResourceStatus::Available),
        })
    }

    pub fn into_patch(self) -> Result<ResourcePatch, AppError> {
        Ok(ResourcePatch {
            name: optional_text(self.name, "name")?,
            resource_type: optional_enum(self.resource_type)?,
            quantity: self.quantity.map(check_quantity).transpose()?,
            unit: optional_text(self.unit, "unit")?,
            location: self.location.map(LocationPayload::validate).transpose()?,
            description: self.description,
            status: optional_enum(self.status)?,
        })
    }
}

impl ResourcePatch {
    pub fn apply(self, mut resource: Resource, now: DateTime<Utc>) -> Resource {
        if let Some(name) = self.name {
            resource.name = name;
        }
        if let Some(resource_type) = self.resource_type {
            resource.resource_type = resource_type;
        }
        if let Some(quantity) = self.quantity {
            resource.quantity = quantity;
        }
        if let Some(unit) = self.unit {
            resource.unit = unit;
        }
        if let Some(location) = self.location {
            resource.location = location;
        }
        if let Some(description) = self.description {
            resource.description = Some(description);
        }
        if let Some(status) = self.status {
            resource.status = status;
        }
        resource.version += 1;
        resource.updated_at = now;
        resource
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFilter {
    pub status: Option<ResourceStatus>,
    pub resource_type: Option<ResourceType>,
}

impl ResourceFilter {
    pub fn from_params(
        status: Option<String>,
        resource_type: Option<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            status: optional_enum(status.filter(|s| !s.is_empty()))?,
            resource_type: optional_enum(resource_type.filter(|t| !t.is_empty()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now;

    fn water_payload() -> ResourcePayload {
        serde_json::from_str(
            r#"{
                "name": "Bottled water",
                "type": "Water",
                "quantity": 500,
                "unit": "liters",
                "location": { "coordinates": [-80.2, 25.8], "address": "Shelter 4" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_new_resource_defaults() {
        let new = water_payload().into_new().unwrap();
        assert_eq!(new.status, ResourceStatus::Available);
        assert_eq!(new.quantity, 500.0);
        assert_eq!(new.description, None);
    }

    #[test]
    fn test_quantity_validation() {
        let mut p = water_payload();
        p.quantity = None;
        assert_eq!(
            p.into_new().unwrap_err().to_string(),
            "Please specify the quantity"
        );

        let mut p = water_payload();
        p.quantity = Some(-3.0);
        assert!(p.into_new().is_err());

        let patch: ResourcePayload = serde_json::from_str(r#"{"quantity": -1}"#).unwrap();
        assert!(patch.into_patch().is_err());
    }

    #[test]
    fn test_patch_apply() {
        let resource = Resource::create(water_payload().into_new().unwrap(), "r1", now());
        let patch: ResourcePayload =
            serde_json::from_str(r#"{"status":"Depleted","quantity":0}"#).unwrap();
        let updated = patch.into_patch().unwrap().apply(resource.clone(), now());
        assert_eq!(updated.status, ResourceStatus::Depleted);
        assert_eq!(updated.quantity, 0.0);
        assert_eq!(updated.unit, "liters");
        assert_eq!(updated.version, resource.version + 1);
    }

    #[test]
    fn test_filter() {
        let resource = Resource::create(water_payload().into_new().unwrap(), "r1", now());
        let filter = ResourceFilter::from_params(None, Some("Water".into())).unwrap();
        assert!(resource.matches(&filter));
        let filter = ResourceFilter::from_params(Some("Reserved".into()), None).unwrap();
        assert!(!resource.matches(&filter));
    }
}
