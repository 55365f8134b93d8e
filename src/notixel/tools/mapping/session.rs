use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::notixel::tools::error::{Result, ToolError};
use crate::notixel::tools::mapping::invariants::{Notice, enforce_invariants};
use crate::notixel::tools::mapping::recurring::{EMPTY_SELECTION, RecurringSelection};
use crate::notixel::tools::mapping::store::MappingStore;
use crate::notixel::tools::mapping::unmatched::UnmatchedFields;
use crate::notixel::tools::model::{
    Correspondence, Direction, FieldDescriptor, Side, is_identifier,
};

/// The single in-memory configuration being edited.
///
/// Every public mutator restores the identifier and recurring-selection
/// invariants before returning, and returns the notices that pass produced.
/// A session has exactly one writer; share it across tasks through
/// [`SessionHandle`](crate::notixel::tools::handle::SessionHandle).
#[derive(Debug, Clone, PartialEq)]
pub struct MappingSession {
    pub(super) direction: Direction,
    pub(super) source_fields: Vec<FieldDescriptor>,
    pub(super) target_fields: Vec<FieldDescriptor>,
    pub(super) store: MappingStore,
    pub(super) recurring: BTreeMap<Direction, RecurringSelection>,
    pub(super) recurring_enabled: bool,
    pub(super) unmatched: UnmatchedFields,
    pub(super) notices: Vec<Notice>,
}

impl MappingSession {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            source_fields: Vec::new(),
            target_fields: Vec::new(),
            store: MappingStore::new(),
            recurring: BTreeMap::new(),
            recurring_enabled: false,
            unmatched: UnmatchedFields::default(),
            notices: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) -> Vec<Notice> {
        self.direction = direction;
        self.enforce()
    }

    /// Replaces the source snapshot and resets the mappings keyed by source
    /// fields. A snapshot without an identifier column is rejected and leaves
    /// the session without source fields.
    #[instrument(level = "debug", skip_all, fields(field_count = fields.len()))]
    pub fn load_source_fields(&mut self, fields: Vec<FieldDescriptor>) -> Result<Vec<Notice>> {
        if !fields.iter().any(FieldDescriptor::is_identifier) {
            self.source_fields.clear();
            self.store.clear(Direction::SourceToTarget);
            self.unmatched.clear();
            self.enforce();
            return Err(ToolError::MissingIdentifierColumn(
                "the selected worksheet".to_string(),
            ));
        }
        self.store.populate(Direction::SourceToTarget, &fields);
        self.source_fields = fields;
        if !self.target_fields.is_empty() {
            self.unmatched
                .recompute(&self.source_fields, &self.target_fields);
        }
        Ok(self.enforce())
    }

    /// Replaces the target snapshot, resets the mappings keyed by target
    /// fields and recomputes the unmatched source fields.
    #[instrument(level = "debug", skip_all, fields(field_count = fields.len()))]
    pub fn load_target_fields(&mut self, fields: Vec<FieldDescriptor>) -> Vec<Notice> {
        self.store.populate(Direction::TargetToSource, &fields);
        self.target_fields = fields;
        self.unmatched
            .recompute(&self.source_fields, &self.target_fields);
        debug!(
            unmatched = self.unmatched.candidates().len(),
            "unmatched source fields recomputed"
        );
        self.enforce()
    }

    /// Links `left_field` to `right_field`, or removes its link when
    /// `right_field` is blank. Removing a link also removes the field from
    /// the recurring selection.
    pub fn set_correspondence(&mut self, left_field: &str, right_field: &str) -> Result<Vec<Notice>> {
        if !self.left_fields().iter().any(|field| field.name() == left_field) {
            return Err(ToolError::UnknownField(left_field.to_string()));
        }
        self.apply_correspondence(left_field, right_field);
        Ok(self.enforce())
    }

    pub(super) fn apply_correspondence(&mut self, left_field: &str, right_field: &str) {
        self.store.upsert(self.direction, left_field, right_field);
        if right_field.trim().is_empty() {
            self.recurring_mut().set_included(left_field, false);
        }
    }

    pub fn set_recurring_enabled(&mut self, enabled: bool) -> Vec<Notice> {
        self.recurring_enabled = enabled;
        self.enforce()
    }

    /// Adds or removes a field from the recurring selection. Callers only
    /// offer this while the field is mapped and the recurring flag is on.
    pub fn set_recurring_included(&mut self, left_field: &str, included: bool) -> Vec<Notice> {
        if included && !self.store.is_linked(self.direction, left_field) {
            warn!(%left_field, "recurring selection requested for an unmapped field");
        }
        self.recurring_mut().set_included(left_field, included);
        self.enforce()
    }

    /// Picks an unmatched source field for creation on the target.
    pub fn set_create_field(&mut self, field: &str, selected: bool) -> Result<()> {
        self.unmatched.set_selected(field, selected)?;
        Ok(())
    }

    pub fn fields(&self, side: Side) -> &[FieldDescriptor] {
        match side {
            Side::Source => &self.source_fields,
            Side::Target => &self.target_fields,
        }
    }

    pub fn left_fields(&self) -> &[FieldDescriptor] {
        self.fields(self.direction.left_side())
    }

    pub fn right_fields(&self) -> &[FieldDescriptor] {
        self.fields(self.direction.right_side())
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Correspondences of the current direction, placeholders included.
    pub fn correspondences(&self) -> &[Correspondence] {
        self.store.correspondences(self.direction)
    }

    /// Recurring selection of the current direction. Each direction keeps its
    /// own selection, so switching direction leaves the other one intact.
    pub fn recurring(&self) -> &RecurringSelection {
        self.recurring_for(self.direction)
    }

    pub fn recurring_for(&self, direction: Direction) -> &RecurringSelection {
        self.recurring.get(&direction).unwrap_or(&EMPTY_SELECTION)
    }

    pub(super) fn recurring_mut(&mut self) -> &mut RecurringSelection {
        self.recurring.entry(self.direction).or_default()
    }

    pub fn recurring_enabled(&self) -> bool {
        self.recurring_enabled
    }

    pub fn unmatched(&self) -> &UnmatchedFields {
        &self.unmatched
    }

    /// Fields to create on the target during a transfer. Only the
    /// source-to-target direction creates fields.
    pub fn fields_to_create(&self) -> Vec<String> {
        match self.direction {
            Direction::SourceToTarget => self.unmatched.selected().to_vec(),
            Direction::TargetToSource => Vec::new(),
        }
    }

    /// Every notice produced since the session was created.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// One row per left field, identifier first.
    pub fn rows(&self) -> Vec<MappingRow> {
        let mut rows: Vec<MappingRow> = self
            .left_fields()
            .iter()
            .map(|field| self.row_for(field))
            .collect();
        rows.sort_by_key(|row| !row.is_identifier);
        rows
    }

    fn row_for(&self, field: &FieldDescriptor) -> MappingRow {
        let right_field = self
            .store
            .get(self.direction, field.name())
            .filter(|entry| entry.is_linked())
            .map(|entry| entry.right_field.clone());
        let identifier = is_identifier(field.name());
        let recurring = match (identifier, self.recurring_enabled, right_field.is_some()) {
            (true, true, true) => RecurringStatus::Required,
            (true, true, false) => RecurringStatus::AwaitingMapping,
            (_, false, _) => RecurringStatus::GlobalOff,
            (false, true, false) => RecurringStatus::Unavailable,
            (false, true, true) if self.recurring().contains(field.name()) => {
                RecurringStatus::Included
            }
            (false, true, true) => RecurringStatus::Excluded,
        };
        MappingRow {
            left_field: field.name().to_string(),
            right_field,
            is_identifier: identifier,
            recurring,
        }
    }

    /// Read-only projection handed to the presentation layer.
    pub fn view(&self) -> SessionView {
        SessionView {
            direction: self.direction,
            recurring_enabled: self.recurring_enabled,
            rows: self.rows(),
            right_choices: self
                .right_fields()
                .iter()
                .map(|field| field.label(self.direction))
                .collect(),
            recurring_fields: self.recurring().iter().map(str::to_string).collect(),
            unmatched: self.unmatched.candidates().to_vec(),
            fields_to_create: self.fields_to_create(),
            notices: self.notices.iter().map(ToString::to_string).collect(),
        }
    }

    fn enforce(&mut self) -> Vec<Notice> {
        let notices = enforce_invariants(self);
        self.notices.extend(notices.iter().cloned());
        notices
    }
}

/// Recurring-job status of one mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringStatus {
    /// The identifier is mapped and the recurring flag is on.
    Required,
    /// The recurring flag is on but the identifier is not mapped yet.
    AwaitingMapping,
    /// The recurring flag is off.
    GlobalOff,
    /// The field is not mapped, so it cannot join the recurring job.
    Unavailable,
    Included,
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    pub left_field: String,
    pub right_field: Option<String>,
    pub is_identifier: bool,
    pub recurring: RecurringStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub direction: Direction,
    pub recurring_enabled: bool,
    pub rows: Vec<MappingRow>,
    pub right_choices: Vec<String>,
    pub recurring_fields: Vec<String>,
    pub unmatched: Vec<String>,
    pub fields_to_create: Vec<String>,
    pub notices: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(names: &[&str]) -> Vec<FieldDescriptor> {
        names.iter().map(|name| FieldDescriptor::source(*name)).collect()
    }

    fn targets(names: &[&str]) -> Vec<FieldDescriptor> {
        names
            .iter()
            .map(|name| FieldDescriptor::target(*name, Some("rich_text".into())))
            .collect()
    }

    #[test]
    fn source_without_identifier_is_rejected() {
        let mut session = MappingSession::new(Direction::SourceToTarget);
        session
            .load_source_fields(sources(&["id", "Name"]))
            .expect("source loaded");

        let error = session
            .load_source_fields(sources(&["Name", "Notes"]))
            .expect_err("missing identifier");
        assert!(matches!(error, ToolError::MissingIdentifierColumn(_)));
        assert!(session.fields(Side::Source).is_empty());
        assert!(session.correspondences().is_empty());
    }

    #[test]
    fn unknown_left_field_is_rejected() {
        let mut session = MappingSession::new(Direction::SourceToTarget);
        session
            .load_source_fields(sources(&["id", "Name"]))
            .expect("source loaded");
        assert!(matches!(
            session.set_correspondence("Missing", "Title"),
            Err(ToolError::UnknownField(name)) if name == "Missing"
        ));
    }

    #[test]
    fn removing_a_link_revokes_recurring_membership() {
        let mut session = MappingSession::new(Direction::SourceToTarget);
        session.load_source_fields(sources(&["id", "Name"])).expect("source loaded");
        session.load_target_fields(targets(&["id", "Title"]));
        session.set_recurring_enabled(true);
        session.set_correspondence("Name", "Title").expect("linked");
        session.set_recurring_included("Name", true);
        assert!(session.recurring().contains("Name"));

        session.set_correspondence("Name", "").expect("unlinked");
        assert!(!session.recurring().contains("Name"));
        assert!(session.recurring().contains("id"));
    }

    #[test]
    fn switching_direction_keeps_each_recurring_selection() {
        let mut session = MappingSession::new(Direction::SourceToTarget);
        session.load_source_fields(sources(&["id", "Name"])).expect("source loaded");
        session.load_target_fields(targets(&["id", "Title"]));
        session.set_recurring_enabled(true);
        session.set_correspondence("Name", "Title").expect("linked");
        session.set_recurring_included("Name", true);

        session.set_direction(Direction::TargetToSource);
        assert_eq!(session.recurring().iter().collect::<Vec<_>>(), vec!["id"]);
        assert!(
            session
                .recurring_for(Direction::SourceToTarget)
                .contains("Name")
        );

        session.set_direction(Direction::SourceToTarget);
        assert!(session.store().is_linked(Direction::SourceToTarget, "Name"));
        let mut members: Vec<&str> = session.recurring().iter().collect();
        members.sort();
        assert_eq!(members, vec!["Name", "id"]);
    }

    #[test]
    fn rows_put_identifier_first_and_report_recurring_status() {
        let mut session = MappingSession::new(Direction::SourceToTarget);
        session
            .load_source_fields(sources(&["Name", "Notes", "id"]))
            .expect("source loaded");
        session.load_target_fields(targets(&["id", "Title"]));
        session.set_recurring_enabled(true);
        session.set_correspondence("Name", "Title").expect("linked");

        let rows = session.rows();
        assert_eq!(rows[0].left_field, "id");
        assert_eq!(rows[0].recurring, RecurringStatus::Required);
        assert_eq!(rows[1].right_field.as_deref(), Some("Title"));
        assert_eq!(rows[1].recurring, RecurringStatus::Excluded);
        assert_eq!(rows[2].recurring, RecurringStatus::Unavailable);

        let view = session.view();
        assert_eq!(view.right_choices, vec!["id (rich_text)", "Title (rich_text)"]);
        assert_eq!(view.notices, vec!["ID column was mapped automatically."]);
    }

    #[test]
    fn fields_to_create_only_for_source_to_target() {
        let mut session = MappingSession::new(Direction::SourceToTarget);
        session
            .load_source_fields(sources(&["id", "Notes"]))
            .expect("source loaded");
        session.load_target_fields(targets(&["id"]));
        session.set_create_field("Notes", true).expect("candidate");
        assert_eq!(session.fields_to_create(), vec!["Notes".to_string()]);

        session.set_direction(Direction::TargetToSource);
        assert!(session.fields_to_create().is_empty());
    }
}
