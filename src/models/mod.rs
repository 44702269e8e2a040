use chrono::{DateTime, SubsecRound, Utc};

use crate::error::AppError;

/// Closed set of values stored as text, matched case-sensitively like the API documents them.
/// A variant may carry its own text (`ResourceRequest = "Resource Request"`).
macro_rules! text_enum {
    (@text $variant:ident) => { stringify!($variant) };
    (@text $variant:ident $text:literal) => { $text };
    ($name:ident, $label:literal, { $($variant:ident $(= $text:literal)?),+ $(,)? }) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub enum $name {
            $($(#[serde(rename = $text)])? $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => text_enum!(@text $variant $($text)?)),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match $name::ALL.iter().find(|v| v.as_str() == s) {
                    Some(v) => Ok(*v),
                    None => Err($crate::error::AppError::validation(format!(
                        "'{}' is not a valid {}, expected one of: {}",
                        s,
                        $label,
                        [$(text_enum!(@text $variant $($text)?)),+].join(", ")
                    ))),
                }
            }
        }
    };
}

// Submodules are declared after the macro so they see it in textual scope.
pub mod alert;
pub mod location;
pub mod report;
pub mod resource;

pub use alert::{Alert, AlertFilter, AlertPatch, AlertPayload, AlertStatus, AlertType, NewAlert, Severity};
pub use location::{Location, LocationPayload};
pub use report::{
    NewReport, Report, ReportFilter, ReportPatch, ReportPayload, ReportStatus, ReportType,
};
pub use resource::{
    NewResource, Resource, ResourceFilter, ResourcePatch, ResourcePayload, ResourceStatus,
    ResourceType,
};

/// Timestamps are kept at microsecond precision so they survive a Postgres round trip.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn required_text(value: Option<String>, missing: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(missing))
}

pub(crate) fn optional_text(value: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    match value {
        None => Ok(None),
        Some(v) => required_text(Some(v), &format!("{field} cannot be empty")).map(Some),
    }
}

pub(crate) fn required_enum<T>(value: Option<String>, missing: &str) -> Result<T, AppError>
where
    T: std::str::FromStr<Err = AppError>,
{
    value.ok_or_else(|| AppError::validation(missing))?.parse()
}

pub(crate) fn optional_enum<T>(value: Option<String>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = AppError>,
{
    value.map(|v| v.parse()).transpose()
}
