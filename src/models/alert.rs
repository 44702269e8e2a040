use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::{Location, LocationPayload};
use super::{optional_enum, optional_text, required_enum, required_text};
use crate::db::Document;
use crate::error::AppError;
use crate::geo::GeoPoint;

text_enum!(AlertType, "alert type", {
    Earthquake,
    Flood,
    Fire,
    Hurricane,
    Tornado,
    Other,
});

// Declaration order is urgency order; `Ord` relies on it.
text_enum!(Severity, "severity", { Low, Medium, High, Critical });

text_enum!(AlertStatus, "alert status", { Active, Resolved, Monitoring });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(alias = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub location: Location,
    pub status: AlertStatus,
    pub created_by: String,
    /// Bumped on every committed write; lets clients discard stale copies.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn create(new: NewAlert, created_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            alert_type: new.alert_type,
            severity: new.severity,
            location: new.location,
            status: new.status,
            created_by: created_by.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Alert {
    type Filter = AlertFilter;
    const LABEL: &'static str = "Alert";

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

    fn matches(&self, filter: &AlertFilter) -> bool {
        filter.status.map_or(true, |s| s == self.status)
            && filter.alert_type.map_or(true, |t| t == self.alert_type)
    }
}

/// Raw create/update body. Everything is optional here so missing fields surface as
/// validation errors with a readable message instead of a deserializer failure.
/// Server-owned fields (`id`, `createdBy`, timestamps, `version`) are not accepted.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub location: Option<LocationPayload>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub title: String,
    pub description: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub location: Location,
    pub status: AlertStatus,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlertPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub alert_type: Option<AlertType>,
    pub severity: Option<Severity>,
    pub location: Option<Location>,
    pub status: Option<AlertStatus>,
}

impl AlertPayload {
    pub fn into_new(self) -> Result<NewAlert, AppError> {
        Ok(NewAlert {
            title: required_text(self.title, "Please add a title")?,
            description: required_text(self.description, "Please add a description")?,
            alert_type: required_enum(self.alert_type, "Please specify the alert type")?,
            severity: required_enum(self.severity, "Please specify the severity")?,
            location: self
                .location
                .ok_or_else(|| AppError::validation("Please add a location"))?
                .validate()?,
            status: optional_enum(self.status)?.unwrap_or(AlertStatus::Active),
        })
    }

    /// Validates only the fields that are present; a location replaces the old one whole.
    pub fn into_patch(self) -> Result<AlertPatch, AppError> {
        Ok(AlertPatch {
            title: optional_text(self.title, "title")?,
            description: optional_text(self.description, "description")?,
            alert_type: optional_enum(self.alert_type)?,
            severity: optional_enum(self.severity)?,
            location: self.location.map(LocationPayload::validate).transpose()?,
            status: optional_enum(self.status)?,
        })
    }
}

impl AlertPatch {
    pub fn apply(self, mut alert: Alert, now: DateTime<Utc>) -> Alert {
        if let Some(title) = self.title {
            alert.title = title;
        }
        if let Some(description) = self.description {
            alert.description = description;
        }
        if let Some(alert_type) = self.alert_type {
            alert.alert_type = alert_type;
        }
        if let Some(severity) = self.severity {
            alert.severity = severity;
        }
        if let Some(location) = self.location {
            alert.location = location;
        }
        if let Some(status) = self.status {
            alert.status = status;
        }
        alert.version += 1;
        alert.updated_at = now;
        alert
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
}

impl AlertFilter {
    pub fn from_params(status: Option<String>, alert_type: Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            status: optional_enum(status.filter(|s| !s.is_empty()))?,
            alert_type: optional_enum(alert_type.filter(|t| !t.is_empty()))?,
        })
    }
}
