use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::notixel::tools::mapping::session::MappingSession;
use crate::notixel::tools::model::is_identifier;

/// Informational message produced while invariants are restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The identifier fields of both schemas were linked automatically.
    IdentifierAutoLinked {
        left_field: String,
        right_field: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::IdentifierAutoLinked { .. } => {
                f.write_str("ID column was mapped automatically.")
            }
        }
    }
}

/// Restores the cross-field invariants of `session` and reports what was
/// done. Calling it again without an intervening edit changes nothing and
/// reports nothing.
///
/// 1. With both schemas loaded and no linked identifier, the identifier
///    fields of both sides are linked through the regular upsert path.
/// 2. Members of the current direction's recurring set that are no longer
///    linked are dropped. The other direction's set is left alone.
/// 3. With the recurring flag on, the linked identifier joins the current
///    recurring set; with the flag off, it leaves it.
pub fn enforce_invariants(session: &mut MappingSession) -> Vec<Notice> {
    let direction = session.direction;
    let mut notices = Vec::new();

    if let Some((left_field, right_field)) = identifier_link_candidate(session) {
        session.apply_correspondence(&left_field, &right_field);
        info!(%direction, %left_field, %right_field, "identifier linked automatically");
        notices.push(Notice::IdentifierAutoLinked {
            left_field,
            right_field,
        });
    }

    let linked: HashSet<&str> = session
        .store
        .linked(direction)
        .map(|entry| entry.left_field.as_str())
        .collect();
    let identifier = session
        .store
        .linked_identifier(direction)
        .map(|entry| entry.left_field.clone());
    let selection = session.recurring.entry(direction).or_default();
    if selection.retain(|field| linked.contains(field)) {
        debug!(%direction, "dropped unmapped fields from the recurring selection");
    }

    if session.recurring_enabled {
        if !selection.contains_identifier() {
            if let Some(identifier) = identifier {
                selection.set_included(&identifier, true);
                debug!(%identifier, "identifier added to the recurring selection");
            }
        }
    } else if selection.remove_identifier() {
        debug!("identifier removed from the recurring selection");
    }

    notices
}

fn identifier_link_candidate(session: &MappingSession) -> Option<(String, String)> {
    if session.source_fields.is_empty() || session.target_fields.is_empty() {
        return None;
    }
    if session.store.linked_identifier(session.direction).is_some() {
        return None;
    }
    let left = session
        .left_fields()
        .iter()
        .find(|field| is_identifier(field.name()))?;
    let right = session
        .right_fields()
        .iter()
        .find(|field| is_identifier(field.name()))?;
    Some((left.name().to_string(), right.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notixel::tools::model::{Direction, FieldDescriptor};

    fn session(direction: Direction, source: &[&str], target: &[&str]) -> MappingSession {
        let mut session = MappingSession::new(direction);
        session.source_fields = source.iter().map(|n| FieldDescriptor::source(*n)).collect();
        session.target_fields = target
            .iter()
            .map(|n| FieldDescriptor::target(*n, None))
            .collect();
        session
    }

    #[test]
    fn links_identifier_once() {
        let mut state = session(Direction::SourceToTarget, &["ID", "Name"], &["id", "Title"]);

        let first = enforce_invariants(&mut state);
        assert_eq!(
            first,
            vec![Notice::IdentifierAutoLinked {
                left_field: "ID".into(),
                right_field: "id".into(),
            }]
        );
        let snapshot = state.clone();

        assert!(enforce_invariants(&mut state).is_empty());
        assert_eq!(state, snapshot);
    }

    #[test]
    fn nothing_happens_without_both_schemas() {
        let mut state = session(Direction::SourceToTarget, &["id", "Name"], &[]);
        assert!(enforce_invariants(&mut state).is_empty());
        assert!(state.store.linked_identifier(Direction::SourceToTarget).is_none());
    }

    #[test]
    fn no_link_when_right_side_lacks_identifier() {
        let mut state = session(Direction::TargetToSource, &["id", "Name"], &["Key", "Title"]);
        assert!(enforce_invariants(&mut state).is_empty());
        assert_eq!(state.store.linked(Direction::TargetToSource).count(), 0);
    }

    #[test]
    fn recurring_flag_drives_identifier_membership() {
        let mut state = session(Direction::SourceToTarget, &["Id", "Name"], &["ID", "Title"]);
        state.recurring_enabled = true;
        enforce_invariants(&mut state);
        assert_eq!(state.recurring().iter().collect::<Vec<_>>(), vec!["Id"]);

        state.recurring_enabled = false;
        enforce_invariants(&mut state);
        assert!(state.recurring().is_empty());
    }

    #[test]
    fn differently_cased_identifier_member_settles_in_one_pass() {
        let mut state = session(Direction::SourceToTarget, &["ID"], &["id"]);
        state.recurring_enabled = true;
        state.recurring_mut().set_included("id", true);

        enforce_invariants(&mut state);
        assert_eq!(state.recurring().iter().collect::<Vec<_>>(), vec!["ID"]);
        let snapshot = state.clone();
        enforce_invariants(&mut state);
        assert_eq!(state, snapshot);
    }
}
