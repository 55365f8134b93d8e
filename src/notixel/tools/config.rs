//! Client and session configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::notixel::tools::error::{Result, ToolError};
use crate::notixel::tools::io::excel_read;
use crate::notixel::tools::mapping::MappingSession;
use crate::notixel::tools::model::{Direction, FieldDescriptor, SourceRef, TargetRef};
use crate::notixel::tools::remote::SchemaRemote;
use crate::notixel::tools::sync::SyncEndpoints;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Interval used for recurring jobs when the session does not name one.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;

/// Settings for the HTTP client talking to the sync service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// No client-side timeout unless one is configured.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            timeout: None,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Reads `NOTIXEL_API_URL`, `NOTIXEL_HTTP_TIMEOUT_SECS` and
    /// `NOTIXEL_USER_AGENT`. A timeout that is not a whole number of seconds
    /// is rejected.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let timeout = match lookup("NOTIXEL_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    ToolError::InvalidConfig(format!(
                        "NOTIXEL_HTTP_TIMEOUT_SECS must be a number of seconds, got '{raw}'"
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };
        Ok(Self {
            api_base_url: lookup("NOTIXEL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout,
            user_agent: lookup("NOTIXEL_USER_AGENT"),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

/// A configuration session stored as JSON: which worksheet and database to
/// connect, how their fields correspond, and what the recurring job covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    pub user_id: i64,
    pub direction: Direction,
    pub source: SourceSection,
    pub target: TargetSection,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
    #[serde(default)]
    pub recurring: RecurringSection,
    #[serde(default)]
    pub create_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSection {
    #[serde(flatten)]
    pub reference: SourceRef,
    /// Local workbook to read the header row from instead of the service.
    #[serde(default)]
    pub workbook: Option<PathBuf>,
    /// Inline column names, used as-is when present.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSection {
    #[serde(flatten)]
    pub reference: TargetRef,
    /// Inline property list, used as-is when present.
    #[serde(default)]
    pub properties: Option<Vec<PropertyEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub name: String,
    #[serde(default, rename = "type")]
    pub declared_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub left: String,
    #[serde(default)]
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default = "default_interval")]
    pub interval_minutes: u32,
}

impl Default for RecurringSection {
    fn default() -> Self {
        Self {
            enabled: false,
            fields: Vec::new(),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL_MINUTES
}

impl SessionFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        let session: Self = serde_json::from_str(&data)?;
        info!(path = %path.display(), direction = %session.direction, "loaded session file");
        Ok(session)
    }

    pub fn endpoints(&self) -> SyncEndpoints {
        SyncEndpoints {
            user_id: self.user_id,
            source: self.source.reference.clone(),
            target: self.target.reference.clone(),
        }
    }

    /// Builds the mapping session: loads both snapshots (inline, from the
    /// local workbook, or from `schema`), then replays the recorded edits in
    /// the order a user would make them. A worksheet picked automatically is
    /// written back into `self.source`.
    #[instrument(level = "info", skip_all, fields(direction = %self.direction))]
    pub async fn build_session(
        &mut self,
        schema: Option<&dyn SchemaRemote>,
    ) -> Result<MappingSession> {
        let source_fields = self.resolve_source_fields(schema).await?;
        let target_fields = self.resolve_target_fields(schema).await?;

        let mut session = MappingSession::new(self.direction);
        session.load_source_fields(source_fields)?;
        session.load_target_fields(target_fields);
        session.set_recurring_enabled(self.recurring.enabled);

        for entry in &self.mappings {
            session.set_correspondence(&entry.left, &entry.right)?;
        }

        for field in &self.recurring.fields {
            if !self.recurring.enabled || !session.store().is_linked(self.direction, field) {
                warn!(%field, "skipping recurring field: not mapped or recurring sync is off");
                continue;
            }
            session.set_recurring_included(field, true);
        }

        for field in &self.create_fields {
            session.set_create_field(field, true)?;
        }

        Ok(session)
    }

    async fn resolve_source_fields(
        &mut self,
        schema: Option<&dyn SchemaRemote>,
    ) -> Result<Vec<FieldDescriptor>> {
        if let Some(columns) = &self.source.columns {
            return Ok(columns.iter().map(FieldDescriptor::source).collect());
        }

        if let Some(workbook) = &self.source.workbook {
            let requested = non_empty(&self.source.reference.worksheet);
            let worksheet = excel_read::resolve_worksheet(workbook, requested)?;
            let fields = excel_read::read_source_fields(workbook, &worksheet)?;
            self.source.reference.worksheet = worksheet;
            return Ok(fields);
        }

        let schema = schema.ok_or_else(|| {
            ToolError::InvalidConfig("source columns require a workbook or the sync service".into())
        })?;
        let file_id = self.source.reference.file_id.clone();
        if self.source.reference.worksheet.trim().is_empty() {
            let worksheets = schema.worksheets(self.user_id, &file_id).await?;
            self.source.reference.worksheet = pick_single_worksheet(&worksheets)?;
        }
        schema
            .source_fields(self.user_id, &file_id, &self.source.reference.worksheet)
            .await
    }

    async fn resolve_target_fields(
        &self,
        schema: Option<&dyn SchemaRemote>,
    ) -> Result<Vec<FieldDescriptor>> {
        if let Some(properties) = &self.target.properties {
            return Ok(properties
                .iter()
                .map(|p| FieldDescriptor::target(p.name.clone(), p.declared_type.clone()))
                .collect());
        }
        let schema = schema.ok_or_else(|| {
            ToolError::InvalidConfig("target properties require the sync service".into())
        })?;
        schema
            .target_fields(&self.target.reference.database_id)
            .await
    }
}

/// A file with exactly one worksheet needs no choice.
pub fn pick_single_worksheet(worksheets: &[String]) -> Result<String> {
    match worksheets {
        [only] => Ok(only.clone()),
        [] => Err(ToolError::InvalidWorkbook("file has no worksheets".into())),
        many => Err(ToolError::InvalidConfig(format!(
            "choose a worksheet: {}",
            many.join(", ")
        ))),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
