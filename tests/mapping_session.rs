use notixel_tools::ToolError;
use notixel_tools::config::SessionFile;
use notixel_tools::mapping::{MappingSession, Notice, RecurringStatus, enforce_invariants};
use notixel_tools::model::{Direction, FieldDescriptor};

fn sources(names: &[&str]) -> Vec<FieldDescriptor> {
    names.iter().map(|name| FieldDescriptor::source(*name)).collect()
}

fn targets(names: &[(&str, &str)]) -> Vec<FieldDescriptor> {
    names
        .iter()
        .map(|(name, kind)| FieldDescriptor::target(*name, Some(kind.to_string())))
        .collect()
}

fn loaded(direction: Direction) -> MappingSession {
    let mut session = MappingSession::new(direction);
    session
        .load_source_fields(sources(&["id", "Name"]))
        .expect("source loaded");
    session.load_target_fields(targets(&[("id", "rich_text"), ("Title", "title")]));
    session
}

fn linked_pairs(session: &MappingSession) -> Vec<(String, String)> {
    session
        .correspondences()
        .iter()
        .filter(|entry| entry.is_linked())
        .map(|entry| (entry.left_field.clone(), entry.right_field.clone()))
        .collect()
}

#[test]
fn identifier_is_linked_once_and_name_can_be_mapped() {
    let mut session = MappingSession::new(Direction::SourceToTarget);
    assert!(
        session
            .load_source_fields(sources(&["id", "Name"]))
            .expect("source loaded")
            .is_empty()
    );
    let notices = session.load_target_fields(targets(&[("id", "rich_text"), ("Title", "title")]));
    assert_eq!(
        notices,
        vec![Notice::IdentifierAutoLinked {
            left_field: "id".into(),
            right_field: "id".into(),
        }]
    );

    session.set_correspondence("Name", "Title").expect("linked");
    assert_eq!(
        linked_pairs(&session),
        vec![
            ("id".to_string(), "id".to_string()),
            ("Name".to_string(), "Title".to_string())
        ]
    );
    assert_eq!(session.notices().len(), 1);
}

#[test]
fn each_left_field_has_at_most_one_row() {
    let mut session = loaded(Direction::SourceToTarget);
    session.set_correspondence("Name", "Title").expect("linked");
    session.set_correspondence("Name", "id").expect("relinked");
    session.set_correspondence("Name", "Title").expect("relinked");

    let rows_for_name = session
        .correspondences()
        .iter()
        .filter(|entry| entry.left_field == "Name")
        .count();
    assert_eq!(rows_for_name, 1);
    assert_eq!(
        session
            .store()
            .get(Direction::SourceToTarget, "Name")
            .map(|entry| entry.right_field.as_str()),
        Some("Title")
    );
}

#[test]
fn clearing_the_identifier_lets_it_be_linked_again() {
    let mut session = loaded(Direction::SourceToTarget);
    let notices = session.set_correspondence("id", "").expect("unlinked");

    // The auto-link rule restores the identifier link immediately.
    assert_eq!(notices.len(), 1);
    assert!(session.store().linked_identifier(Direction::SourceToTarget).is_some());
}

#[test]
fn recurring_selection_stays_within_linked_fields() {
    let mut session = loaded(Direction::SourceToTarget);
    session.set_recurring_enabled(true);
    session.set_correspondence("Name", "Title").expect("linked");
    session.set_recurring_included("Name", true);

    let mut members: Vec<&str> = session.recurring().iter().collect();
    members.sort();
    assert_eq!(members, vec!["Name", "id"]);

    session.set_direction(Direction::TargetToSource);
    assert!(
        session
            .recurring()
            .iter()
            .all(|field| session.store().is_linked(Direction::TargetToSource, field))
    );

    session.set_recurring_enabled(false);
    assert!(!session.recurring().contains_identifier());
    assert!(
        session
            .rows()
            .iter()
            .all(|row| row.recurring == RecurringStatus::GlobalOff)
    );
}

#[test]
fn direction_round_trip_keeps_recurring_selection() {
    let mut session = loaded(Direction::SourceToTarget);
    session.set_recurring_enabled(true);
    session.set_correspondence("Name", "Title").expect("linked");
    session.set_recurring_included("Name", true);

    session.set_direction(Direction::TargetToSource);
    session.set_direction(Direction::SourceToTarget);

    assert!(session.store().is_linked(Direction::SourceToTarget, "Name"));
    assert!(session.recurring().contains("Name"));
    assert_eq!(
        session
            .rows()
            .iter()
            .find(|row| row.left_field == "Name")
            .map(|row| row.recurring),
        Some(RecurringStatus::Included)
    );
}

#[test]
fn enforcing_twice_changes_nothing() {
    let mut session = loaded(Direction::TargetToSource);
    session.set_recurring_enabled(true);
    let snapshot = session.clone();

    assert!(enforce_invariants(&mut session).is_empty());
    assert_eq!(session, snapshot);
}

#[test]
fn unmatched_fields_skip_identifier_and_existing_names() {
    let mut session = MappingSession::new(Direction::SourceToTarget);
    session
        .load_source_fields(sources(&["id", "Name", "Notes"]))
        .expect("source loaded");
    session.load_target_fields(targets(&[("ID", "rich_text"), ("name", "title")]));

    assert_eq!(session.unmatched().candidates(), ["Notes".to_string()]);
    assert!(matches!(
        session.set_create_field("Name", true),
        Err(ToolError::UnknownField(_))
    ));
    session.set_create_field("Notes", true).expect("candidate");
    assert_eq!(session.view().fields_to_create, vec!["Notes".to_string()]);

    // Reloading the target resets the selection.
    session.load_target_fields(targets(&[("ID", "rich_text")]));
    assert_eq!(
        session.unmatched().candidates(),
        ["Name".to_string(), "Notes".to_string()]
    );
    assert!(session.fields_to_create().is_empty());
}

#[tokio::test]
async fn session_file_replays_recorded_edits() {
    let mut file: SessionFile = serde_json::from_value(serde_json::json!({
        "user_id": 42,
        "direction": "excel-to-notion",
        "source": {
            "file_id": "01XYZ",
            "file_name": "Tasks.xlsx",
            "worksheet": "Sheet1",
            "columns": ["ID", "Name", "Notes"]
        },
        "target": {
            "database_id": "db-7",
            "properties": [
                { "name": "id", "type": "rich_text" },
                { "name": "Title", "type": "title" }
            ]
        },
        "mappings": [ { "left": "Name", "right": "Title" } ],
        "recurring": { "enabled": true, "fields": ["Name", "Notes"] },
        "create_fields": ["Notes"]
    }))
    .expect("session file parsed");

    let session = file.build_session(None).await.expect("session built");

    assert_eq!(session.direction(), Direction::SourceToTarget);
    assert_eq!(
        linked_pairs(&session),
        vec![
            ("ID".to_string(), "id".to_string()),
            ("Name".to_string(), "Title".to_string())
        ]
    );
    let mut members: Vec<&str> = session.recurring().iter().collect();
    members.sort();
    assert_eq!(members, vec!["ID", "Name"]);
    assert_eq!(session.fields_to_create(), vec!["Notes".to_string()]);
    assert_eq!(file.recurring.interval_minutes, 60);
}

#[tokio::test]
async fn session_file_without_schema_source_is_rejected() {
    let mut file: SessionFile = serde_json::from_value(serde_json::json!({
        "user_id": 1,
        "direction": "notion-to-excel",
        "source": { "file_id": "01XYZ", "columns": ["id"] },
        "target": { "database_id": "db-7" }
    }))
    .expect("session file parsed");

    assert!(matches!(
        file.build_session(None).await,
        Err(ToolError::InvalidConfig(_))
    ));
}
