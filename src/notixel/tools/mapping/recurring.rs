use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::notixel::tools::model::{is_identifier, normalize_name};

/// Left field names opted into the recurring job for one direction.
///
/// The set only tracks membership. Callers are expected to toggle a field only
/// while it is mapped and the recurring flag is on; the session's invariant
/// pass drops members that stop being mapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecurringSelection {
    fields: Vec<String>,
}

pub(crate) static EMPTY_SELECTION: RecurringSelection = RecurringSelection { fields: Vec::new() };

impl RecurringSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or removes `left_field`. Returns whether membership changed.
    pub fn set_included(&mut self, left_field: &str, included: bool) -> bool {
        let present = self.contains(left_field);
        match (included, present) {
            (true, false) => {
                self.fields.push(left_field.to_string());
                true
            }
            (false, true) => {
                self.fields.retain(|field| field != left_field);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, left_field: &str) -> bool {
        self.fields.iter().any(|field| field == left_field)
    }

    pub fn contains_identifier(&self) -> bool {
        self.fields.iter().any(|field| is_identifier(field))
    }

    /// Drops every identifier member. Returns whether anything was removed.
    pub fn remove_identifier(&mut self) -> bool {
        self.retain(|field| !is_identifier(field))
    }

    /// Keeps only the members accepted by `keep`. Returns whether anything was
    /// removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> bool {
        let before = self.fields.len();
        self.fields.retain(|field| keep(field.as_str()));
        self.fields.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Lower-cased, trimmed members, as used when matching server rows.
    pub fn normalized(&self) -> BTreeSet<String> {
        self.fields.iter().map(|field| normalize_name(field)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_is_idempotent() {
        let mut selection = RecurringSelection::new();
        assert!(selection.set_included("Name", true));
        assert!(!selection.set_included("Name", true));
        assert_eq!(selection.len(), 1);
        assert!(selection.set_included("Name", false));
        assert!(!selection.set_included("Name", false));
        assert!(selection.is_empty());
    }

    #[test]
    fn identifier_membership_ignores_case() {
        let mut selection = RecurringSelection::new();
        selection.set_included("ID", true);
        selection.set_included("Notes", true);

        assert!(selection.contains_identifier());
        assert!(selection.remove_identifier());
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["Notes"]);
    }

    #[test]
    fn normalized_members_are_trimmed_and_lowercased() {
        let mut selection = RecurringSelection::new();
        selection.set_included(" Due Date ", true);
        assert!(selection.normalized().contains("due date"));
    }
}
