//! Synchronization orchestration: validate the mapping, persist it, run one
//! transfer, then optionally register a recurring job.

use std::fmt;

use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::notixel::tools::error::{Result, ToolError};
use crate::notixel::tools::mapping::{MappingSession, RecurringSelection};
use crate::notixel::tools::model::{
    Correspondence, Direction, MappingRecord, PersistedCorrespondence, RecurringJobRequest,
    SourceRef, TargetRef, TransferRequest, is_identifier, normalize_name,
};
use crate::notixel::tools::remote::SyncRemote;

pub const TRANSFER_COMPLETED: &str = "Synchronization completed successfully.";

/// Who is syncing, and between which worksheet and database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEndpoints {
    pub user_id: i64,
    pub source: SourceRef,
    pub target: TargetRef,
}

/// Everything one run needs, captured from a session at submit time.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub direction: Direction,
    pub endpoints: SyncEndpoints,
    /// Correspondences of `direction`, placeholders included.
    pub correspondences: Vec<Correspondence>,
    pub fields_to_create: Vec<String>,
    pub recurring_enabled: bool,
    pub recurring: RecurringSelection,
    pub interval_minutes: u32,
}

impl SyncPlan {
    pub fn from_session(
        session: &MappingSession,
        endpoints: SyncEndpoints,
        interval_minutes: u32,
    ) -> Self {
        Self {
            direction: session.direction(),
            endpoints,
            correspondences: session.correspondences().to_vec(),
            fields_to_create: session.fields_to_create(),
            recurring_enabled: session.recurring_enabled(),
            recurring: session.recurring().clone(),
            interval_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Validating,
    Persisting,
    Transferring,
    RegisteringRecurring,
    Complete,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Validating => "validating",
            SyncState::Persisting => "persisting",
            SyncState::Transferring => "transferring",
            SyncState::RegisteringRecurring => "registering_recurring",
            SyncState::Complete => "complete",
            SyncState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to the recurring job of a run that reached the transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecurringRegistration {
    /// The flag was off or no persisted correspondence was selected.
    Skipped,
    Registered { message: String },
    /// Registration failed after a successful transfer.
    Degraded { detail: String },
}

/// Terminal result of one run.
#[derive(Debug)]
pub struct SyncOutcome {
    pub run_id: Uuid,
    /// Either [`SyncState::Complete`] or [`SyncState::Failed`].
    pub state: SyncState,
    /// Phase that failed, for failed runs.
    pub failed_at: Option<SyncState>,
    /// User-facing summary.
    pub message: String,
    pub error: Option<ToolError>,
    pub persisted: Vec<PersistedCorrespondence>,
    pub recurring: RecurringRegistration,
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == SyncState::Complete
    }
}

/// Drives one run at a time against a [`SyncRemote`]. Remote calls are made
/// in sequence and each is awaited before the next phase starts.
pub struct SyncOrchestrator<'a> {
    remote: &'a dyn SyncRemote,
    state: SyncState,
    history: Vec<SyncState>,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(remote: &'a dyn SyncRemote) -> Self {
        Self {
            remote,
            state: SyncState::Idle,
            history: vec![SyncState::Idle],
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// States visited by the latest run, starting with `Idle`.
    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    pub async fn run(&mut self, plan: &SyncPlan) -> SyncOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", %run_id, direction = %plan.direction);
        self.execute(plan, run_id).instrument(span).await
    }

    async fn execute(&mut self, plan: &SyncPlan, run_id: Uuid) -> SyncOutcome {
        self.state = SyncState::Idle;
        self.history = vec![SyncState::Idle];

        self.transition(SyncState::Validating);
        let linked = match validate(plan.direction, &plan.correspondences) {
            Ok(linked) => linked,
            Err(error) => {
                warn!(%error, "mapping rejected before any remote call");
                let message = error.to_string();
                return self.fail(run_id, message, error, Vec::new());
            }
        };
        info!(mapping_count = linked.len(), "mapping validated");

        self.transition(SyncState::Persisting);
        let records: Vec<MappingRecord> = linked
            .iter()
            .map(|entry| MappingRecord::from_correspondence(plan.direction, entry))
            .collect();
        let persisted = match self
            .remote
            .persist_mappings(plan.endpoints.user_id, &records)
            .await
        {
            Ok(persisted) => persisted,
            Err(error) => {
                let message = match &error {
                    ToolError::Transport(_) => {
                        "A network error occurred while saving mappings.".to_string()
                    }
                    other => format!("Mappings could not be saved: {other}"),
                };
                warn!(%error, "mappings not persisted");
                return self.fail(run_id, message, error, Vec::new());
            }
        };
        info!(persisted = persisted.len(), "mappings persisted");

        self.transition(SyncState::Transferring);
        let transfer = TransferRequest {
            direction: plan.direction,
            source_id: plan.endpoints.source.file_id.clone(),
            target_id: plan.endpoints.target.database_id.clone(),
            user_id: plan.endpoints.user_id,
            worksheet: plan.endpoints.source.worksheet.clone(),
            fields_to_create: match plan.direction {
                Direction::SourceToTarget => plan.fields_to_create.clone(),
                Direction::TargetToSource => Vec::new(),
            },
        };
        if let Err(error) = self.remote.trigger_transfer(&transfer).await {
            let message = match &error {
                ToolError::Transport(_) => format!("Synchronization error: {error}"),
                other => format!("Synchronization error: manual synchronization failed: {other}"),
            };
            warn!(%error, "transfer failed");
            return self.fail(run_id, message, error, persisted);
        }
        info!("transfer completed");

        let correspondence_ids = match_recurring_ids(plan.direction, &persisted, &plan.recurring);
        let recurring = if plan.recurring_enabled && !correspondence_ids.is_empty() {
            self.transition(SyncState::RegisteringRecurring);
            let request = RecurringJobRequest {
                user_id: plan.endpoints.user_id,
                source_id: plan.endpoints.source.file_id.clone(),
                source_name: plan.endpoints.source.file_name.clone(),
                target_id: plan.endpoints.target.database_id.clone(),
                direction: plan.direction,
                interval_minutes: plan.interval_minutes,
                correspondence_ids,
                worksheet: plan.endpoints.source.worksheet.clone(),
            };
            match self.remote.register_recurring(&request).await {
                Ok(message) => {
                    info!(ids = ?request.correspondence_ids, "recurring job registered");
                    RecurringRegistration::Registered { message }
                }
                Err(error) => {
                    warn!(%error, "recurring job not registered");
                    RecurringRegistration::Degraded {
                        detail: error.remote_detail("a network error occurred"),
                    }
                }
            }
        } else {
            debug!(enabled = plan.recurring_enabled, "recurring registration skipped");
            RecurringRegistration::Skipped
        };

        let message = match &recurring {
            RecurringRegistration::Skipped => TRANSFER_COMPLETED.to_string(),
            RecurringRegistration::Registered { message } => format!(
                "Manual synchronization completed and auto sync configured. ({message})"
            ),
            RecurringRegistration::Degraded { detail } => format!(
                "{TRANSFER_COMPLETED} However, auto sync could not be configured: {detail}"
            ),
        };

        self.transition(SyncState::Complete);
        SyncOutcome {
            run_id,
            state: SyncState::Complete,
            failed_at: None,
            message,
            error: None,
            persisted,
            recurring,
        }
    }

    fn transition(&mut self, next: SyncState) {
        debug!(from = %self.state, phase = %next, "sync phase");
        self.state = next;
        self.history.push(next);
    }

    fn fail(
        &mut self,
        run_id: Uuid,
        message: String,
        error: ToolError,
        persisted: Vec<PersistedCorrespondence>,
    ) -> SyncOutcome {
        let failed_at = self.state;
        self.transition(SyncState::Failed);
        SyncOutcome {
            run_id,
            state: SyncState::Failed,
            failed_at: Some(failed_at),
            message,
            error: Some(error),
            persisted,
            recurring: RecurringRegistration::Skipped,
        }
    }
}

/// Linked correspondences of a run. At least one is required, and one of
/// them must have the identifier as its left field.
pub fn validate(direction: Direction, correspondences: &[Correspondence]) -> Result<Vec<Correspondence>> {
    let linked: Vec<Correspondence> = correspondences
        .iter()
        .filter(|entry| entry.is_linked())
        .cloned()
        .collect();
    if linked.is_empty() {
        return Err(ToolError::NoMappings);
    }
    if !linked.iter().any(|entry| is_identifier(&entry.left_field)) {
        debug!(%direction, "no identifier among linked correspondences");
        return Err(ToolError::MissingIdentifier);
    }
    Ok(linked)
}

/// Ids of the persisted correspondences whose left field is in `selection`,
/// comparing trimmed, lower-cased names. Keeps the server's order.
pub fn match_recurring_ids(
    direction: Direction,
    persisted: &[PersistedCorrespondence],
    selection: &RecurringSelection,
) -> Vec<i64> {
    let wanted = selection.normalized();
    persisted
        .iter()
        .filter(|entry| wanted.contains(&normalize_name(entry.left_field(direction))))
        .map(|entry| entry.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(id: i64, source: &str, target: &str) -> PersistedCorrespondence {
        PersistedCorrespondence {
            id,
            source_field: source.into(),
            target_field: target.into(),
        }
    }

    fn selection(fields: &[&str]) -> RecurringSelection {
        let mut selection = RecurringSelection::new();
        for field in fields {
            selection.set_included(field, true);
        }
        selection
    }

    #[test]
    fn validation_requires_a_link() {
        let placeholders = vec![Correspondence {
            left_field: "id".into(),
            right_field: "  ".into(),
            value_kind: String::new(),
        }];
        assert!(matches!(
            validate(Direction::SourceToTarget, &placeholders),
            Err(ToolError::NoMappings)
        ));
    }

    #[test]
    fn validation_requires_the_identifier() {
        let links = vec![Correspondence::linked("Name", "Title")];
        assert!(matches!(
            validate(Direction::SourceToTarget, &links),
            Err(ToolError::MissingIdentifier)
        ));

        let links = vec![
            Correspondence::linked("ID", "id"),
            Correspondence::linked("Name", "Title"),
            Correspondence::placeholder(&crate::notixel::tools::model::FieldDescriptor::source(
                "Notes",
            )),
        ];
        let linked = validate(Direction::SourceToTarget, &links).expect("valid mapping");
        assert_eq!(linked.len(), 2);
    }

    #[test]
    fn recurring_ids_match_trimmed_names_on_the_left_side() {
        let rows = vec![
            persisted(1, "id", "id"),
            persisted(2, "Name", "Title"),
            persisted(3, " Due Date", "Deadline"),
        ];

        assert_eq!(
            match_recurring_ids(Direction::SourceToTarget, &rows, &selection(&["ID", "due date "])),
            vec![1, 3]
        );
        assert_eq!(
            match_recurring_ids(Direction::TargetToSource, &rows, &selection(&["title"])),
            vec![2]
        );
        assert!(
            match_recurring_ids(Direction::SourceToTarget, &rows, &selection(&["Title"])).is_empty()
        );
    }

    #[test]
    fn state_names_are_snake_case() {
        assert_eq!(SyncState::RegisteringRecurring.to_string(), "registering_recurring");
        assert_eq!(
            serde_json::to_value(SyncState::Complete).expect("serialised"),
            serde_json::json!("complete")
        );
    }
}
