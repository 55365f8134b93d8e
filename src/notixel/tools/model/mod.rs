use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::notixel::tools::error::ToolError;

/// Name of the distinguished row identifier field, compared case-insensitively.
pub const IDENTIFIER_FIELD: &str = "id";

/// Value kind attached to every correspondence created through the mapping
/// store. It is not derived from the target field's declared type.
pub const DEFAULT_VALUE_KIND: &str = "Text";

/// Returns `true` when `name` designates the identifier field.
pub fn is_identifier(name: &str) -> bool {
    name.to_lowercase() == IDENTIFIER_FIELD
}

/// Lower-cased, trimmed form used when matching names across the client and
/// the remote service.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The two schemas taking part in a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The spreadsheet worksheet.
    Source,
    /// The structured database.
    Target,
}

/// Which side acts as the "left" side (the mapping keys) for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Spreadsheet columns are mapped onto database properties.
    #[serde(rename = "excel-to-notion")]
    SourceToTarget,
    /// Database properties are mapped onto spreadsheet columns.
    #[serde(rename = "notion-to-excel")]
    TargetToSource,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::SourceToTarget, Direction::TargetToSource];

    /// Wire representation used in request paths and bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::SourceToTarget => "excel-to-notion",
            Direction::TargetToSource => "notion-to-excel",
        }
    }

    /// The side whose field names key the correspondences.
    pub fn left_side(self) -> Side {
        match self {
            Direction::SourceToTarget => Side::Source,
            Direction::TargetToSource => Side::Target,
        }
    }

    pub fn right_side(self) -> Side {
        match self {
            Direction::SourceToTarget => Side::Target,
            Direction::TargetToSource => Side::Source,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "excel-to-notion" => Ok(Direction::SourceToTarget),
            "notion-to-excel" => Ok(Direction::TargetToSource),
            other => Err(ToolError::InvalidConfig(format!("unknown direction '{other}'"))),
        }
    }
}

/// One addressable field on either side of a synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "side", rename_all = "snake_case")]
pub enum FieldDescriptor {
    /// A spreadsheet column. Columns carry no declared type.
    Source { name: String },
    /// A database property with the type the database reports, if any.
    Target {
        name: String,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        declared_type: Option<String>,
    },
}

impl FieldDescriptor {
    pub fn source(name: impl Into<String>) -> Self {
        FieldDescriptor::Source { name: name.into() }
    }

    pub fn target(name: impl Into<String>, declared_type: Option<String>) -> Self {
        FieldDescriptor::Target {
            name: name.into(),
            declared_type,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldDescriptor::Source { name } | FieldDescriptor::Target { name, .. } => name,
        }
    }

    pub fn declared_type(&self) -> Option<&str> {
        match self {
            FieldDescriptor::Source { .. } => None,
            FieldDescriptor::Target { declared_type, .. } => declared_type.as_deref(),
        }
    }

    pub fn side(&self) -> Side {
        match self {
            FieldDescriptor::Source { .. } => Side::Source,
            FieldDescriptor::Target { .. } => Side::Target,
        }
    }

    pub fn is_identifier(&self) -> bool {
        is_identifier(self.name())
    }

    /// Label shown when the field is offered as a right-side choice. Typed
    /// target fields show their type while the target is the right side.
    pub fn label(&self, direction: Direction) -> String {
        match (self, direction) {
            (
                FieldDescriptor::Target {
                    name,
                    declared_type: Some(kind),
                },
                Direction::SourceToTarget,
            ) if !kind.is_empty() => format!("{name} ({kind})"),
            _ => self.name().to_string(),
        }
    }
}

/// One declared link between a left field and a right field.
///
/// A correspondence with an empty right field is a placeholder produced by the
/// initial population of a snapshot; it does not take part in a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondence {
    pub left_field: String,
    pub right_field: String,
    pub value_kind: String,
}

impl Correspondence {
    /// A link created through the mapping store, with the default value kind.
    pub fn linked(left_field: impl Into<String>, right_field: impl Into<String>) -> Self {
        Self {
            left_field: left_field.into(),
            right_field: right_field.into(),
            value_kind: DEFAULT_VALUE_KIND.to_string(),
        }
    }

    /// An unlinked row for `field`, carrying the declared type when the field
    /// has one.
    pub fn placeholder(field: &FieldDescriptor) -> Self {
        Self {
            left_field: field.name().to_string(),
            right_field: String::new(),
            value_kind: field.declared_type().unwrap_or_default().to_string(),
        }
    }

    pub fn is_linked(&self) -> bool {
        !self.right_field.trim().is_empty()
    }

    /// Returns `(source_field, target_field)` for the given direction.
    pub fn source_and_target(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::SourceToTarget => (&self.left_field, &self.right_field),
            Direction::TargetToSource => (&self.right_field, &self.left_field),
        }
    }
}

/// Correspondence as sent to the remote mapping store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    #[serde(rename = "excel_column")]
    pub source_field: String,
    #[serde(rename = "notion_property")]
    pub target_field: String,
    #[serde(rename = "data_type")]
    pub value_kind: String,
}

impl MappingRecord {
    pub fn from_correspondence(direction: Direction, correspondence: &Correspondence) -> Self {
        let (source, target) = correspondence.source_and_target(direction);
        Self {
            source_field: source.to_string(),
            target_field: target.to_string(),
            value_kind: correspondence.value_kind.clone(),
        }
    }
}

/// Server-acknowledged correspondence. The `id` is the durable handle used
/// for recurring-job registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCorrespondence {
    pub id: i64,
    #[serde(rename = "excel_column", default)]
    pub source_field: String,
    #[serde(rename = "notion_property", default)]
    pub target_field: String,
}

impl PersistedCorrespondence {
    /// Field name on the side that plays the left role for `direction`.
    pub fn left_field(&self, direction: Direction) -> &str {
        match direction.left_side() {
            Side::Source => &self.source_field,
            Side::Target => &self.target_field,
        }
    }
}

/// Identifies the worksheet a session reads from or writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub file_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub worksheet: String,
}

/// Identifies the database a session reads from or writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    pub database_id: String,
}

/// Request for one immediate synchronization. The direction travels in the
/// request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    #[serde(skip)]
    pub direction: Direction,
    #[serde(rename = "excel_file_id")]
    pub source_id: String,
    #[serde(rename = "notion_database_id")]
    pub target_id: String,
    pub user_id: i64,
    #[serde(rename = "excel_worksheet_name")]
    pub worksheet: String,
    #[serde(rename = "columns_to_create")]
    pub fields_to_create: Vec<String>,
}

/// Description of a recurring job to register with the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurringJobRequest {
    pub user_id: i64,
    #[serde(rename = "excel_file_id")]
    pub source_id: String,
    #[serde(rename = "excel_file_name")]
    pub source_name: String,
    #[serde(rename = "notion_database_id")]
    pub target_id: String,
    pub direction: Direction,
    pub interval_minutes: u32,
    #[serde(rename = "mapping_ids")]
    pub correspondence_ids: Vec<i64>,
    #[serde(rename = "excel_worksheet_name")]
    pub worksheet: String,
}

/// A spreadsheet file reachable by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: String,
    pub name: String,
}

/// A registered recurring job as listed by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringJob {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "excel_file_id")]
    pub source_id: String,
    #[serde(rename = "notion_database_id")]
    pub target_id: String,
    pub direction: Direction,
    pub interval_minutes: u32,
    pub is_active: bool,
    #[serde(default)]
    pub last_synced: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(rename = "excel_file_name", default)]
    pub source_name: String,
    #[serde(rename = "excel_worksheet_name", default)]
    pub worksheet: String,
    #[serde(rename = "notion_db_name", default)]
    pub target_name: String,
    #[serde(default)]
    pub mapping_details: Vec<RecurringJobMapping>,
}

/// One mapping attached to a recurring job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringJobMapping {
    pub id: i64,
    #[serde(rename = "excel_column", default)]
    pub source_field: String,
    #[serde(rename = "notion_property", default)]
    pub target_field: String,
    #[serde(rename = "data_type", default)]
    pub value_kind: String,
    #[serde(default)]
    pub is_auto_sync_enabled: bool,
}
