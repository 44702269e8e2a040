use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::{Location, LocationPayload};
use super::{optional_enum, optional_text, required_enum, required_text};
use crate::db::Document;
use crate::error::AppError;
use crate::geo::GeoPoint;

text_enum!(ReportType, "report type", {
    Damage,
    Hazard,
    ResourceRequest = "Resource Request",
    ResourceOffer = "Resource Offer",
    StatusUpdate = "Status Update",
    Other,
});

text_enum!(ReportStatus, "report status", { Pending, Verified, Resolved, Rejected });

/// Field observations submitted by the public, optionally tied to an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(alias = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub location: Location,
    pub media: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_alert: Option<Uuid>,
    pub status: ReportStatus,
    pub created_by: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn create(new: NewReport, created_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            report_type: new.report_type,
            location: new.location,
            media: new.media,
            related_alert: new.related_alert,
            status: ReportStatus::Pending,
            created_by: created_by.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Report {
    type Filter = ReportFilter;
    const LABEL: &'static str = "Report";

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

    fn matches(&self, filter: &ReportFilter) -> bool {
        filter.status.map_or(true, |s| s == self.status)
            && filter.report_type.map_or(true, |t| t == self.report_type)
            && filter
                .related_alert
                .map_or(true, |a| self.related_alert == Some(a))
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub location: Option<LocationPayload>,
    pub media: Option<Vec<String>>,
    pub related_alert: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub report_type: ReportType,
    pub location: Location,
    pub media: Vec<String>,
    pub related_alert: Option<Uuid>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub report_type: Option<ReportType>,
    pub location: Option<Location>,
    pub media: Option<Vec<String>>,
    pub related_alert: Option<Uuid>,
    pub status: Option<ReportStatus>,
}

fn check_media(media: Vec<String>) -> Result<Vec<String>, AppError> {
    media
        .into_iter()
        .map(|m| required_text(Some(m), "Media entries cannot be empty"))
        .collect()
}

fn parse_alert_ref(raw: Option<String>) -> Result<Option<Uuid>, AppError> {
    raw.filter(|r| !r.trim().is_empty())
        .map(|r| {
            Uuid::parse_str(r.trim())
                .map_err(|_| AppError::validation(format!("'{r}' is not a valid alert id")))
        })
        .transpose()
}

impl ReportPayload {
    /// New reports always start out `Pending`; a submitted status is ignored.
    pub fn into_new(self) -> Result<NewReport, AppError> {
        Ok(NewReport {
            title: required_text(self.title, "Please add a title")?,
            description: required_text(self.description, "Please add a description")?,
            report_type: required_enum(self.report_type, "Please specify the report type")?,
            location: self
                .location
                .ok_or_else(|| AppError::validation("Please add a location"))?
                .validate()?,
            media: check_media(self.media.unwrap_or_default())?,
            related_alert: parse_alert_ref(self.related_alert)?,
        })
    }

    pub fn into_patch(self) -> Result<ReportPatch, AppError> {
        Ok(ReportPatch {
            title: optional_text(self.title, "title")?,
            description: optional_text(self.description, "description")?,
            report_type: optional_enum(self.report_type)?,
            location: self.location.map(LocationPayload::validate).transpose()?,
            media: self.media.map(check_media).transpose()?,
            related_alert: parse_alert_ref(self.related_alert)?,
            status: optional_enum(self.status)?,
        })
    }
}

impl ReportPatch {
    pub fn apply(self, mut report: Report, now: DateTime<Utc>) -> Report {
        if let Some(title) = self.title {
            report.title = title;
        }
        if let Some(description) = self.description {
            report.description = description;
        }
        if let Some(report_type) = self.report_type {
            report.report_type = report_type;
        }
        if let Some(location) = self.location {
            report.location = location;
        }
        if let Some(media) = self.media {
            report.media = media;
        }
        if let Some(alert) = self.related_alert {
            report.related_alert = Some(alert);
        }
        if let Some(status) = self.status {
            report.status = status;
        }
        report.version += 1;
        report.updated_at = now;
        report
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub report_type: Option<ReportType>,
    pub related_alert: Option<Uuid>,
}

impl ReportFilter {
    /// `alert` selects the reports attached to one alert.
    pub fn from_params(
        status: Option<String>,
        report_type: Option<String>,
        alert: Option<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            status: optional_enum(status.filter(|s| !s.is_empty()))?,
            report_type: optional_enum(report_type.filter(|t| !t.is_empty()))?,
            related_alert: parse_alert_ref(alert)?,
        })
    }
}
