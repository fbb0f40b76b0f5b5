//! Core types shared across the crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub Uuid);

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a report owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of report types the compendium can export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Compendium monsters category
    Monsters,
    /// Compendium weapons category
    Weapons,
    /// Compendium armor category
    Armor,
}

impl ReportType {
    /// All report types, in a stable order
    pub const ALL: [ReportType; 3] = [ReportType::Monsters, ReportType::Weapons, ReportType::Armor];

    /// The wire/database representation of this report type
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Monsters => "monsters",
            ReportType::Weapons => "weapons",
            ReportType::Armor => "armor",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "monsters" => Ok(ReportType::Monsters),
            "weapons" => Ok(ReportType::Weapons),
            "armor" => Ok(ReportType::Armor),
            other => Err(crate::error::Error::Other(format!(
                "unknown report type: {}",
                other
            ))),
        }
    }
}

/// Report lifecycle status, projected from timestamp presence
///
/// The projection is total: every combination of timestamps maps to a
/// status. Completion is checked before failure as a deliberate tie-break
/// if both are ever inconsistently set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Created but not yet claimed by a worker
    Requested,
    /// Claimed and building
    Processing,
    /// Built and uploaded successfully
    Completed,
    /// Build attempt failed
    Failed,
    /// Defensive default; should be unreachable
    Unknown,
}

impl ReportStatus {
    /// The wire representation of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Requested => "requested",
            ReportStatus::Processing => "processing",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
            ReportStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire payload of a queued build request
///
/// Produced once per report creation; may be delivered more than once
/// (at-least-once queue semantics). Carries no other state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Report to build
    pub report_id: ReportId,
    /// Owner of the report
    pub user_id: UserId,
}

/// One compendium record returned by the source fetcher
///
/// Field names mirror the upstream API; list and boolean fields default
/// when the upstream omits them for a given entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompendiumEntry {
    /// Entry name
    pub name: String,
    /// Numeric compendium id
    pub id: i64,
    /// Compendium category (e.g. "monsters")
    #[serde(default)]
    pub category: String,
    /// Entry description text
    #[serde(default)]
    pub description: String,
    /// Entry image URL
    #[serde(default)]
    pub image: String,
    /// Locations where the entry is commonly found
    #[serde(default)]
    pub common_locations: Vec<String>,
    /// Items the entry drops
    #[serde(default)]
    pub drops: Vec<String>,
    /// Whether the entry is DLC-only
    #[serde(default)]
    pub dlc: bool,
}
