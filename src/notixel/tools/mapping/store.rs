use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::notixel::tools::model::{Correspondence, Direction, FieldDescriptor, is_identifier};

/// Per-direction correspondence lists. The two lists are independent: the
/// roles of `left_field` and `right_field` invert between directions, so they
/// are never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStore {
    lists: BTreeMap<Direction, Vec<Correspondence>>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the list for `direction` with one unlinked row per field.
    pub fn populate(&mut self, direction: Direction, fields: &[FieldDescriptor]) {
        let rows = fields.iter().map(Correspondence::placeholder).collect();
        self.lists.insert(direction, rows);
    }

    pub fn clear(&mut self, direction: Direction) {
        self.lists.remove(&direction);
    }

    pub fn correspondences(&self, direction: Direction) -> &[Correspondence] {
        self.lists
            .get(&direction)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, direction: Direction, left_field: &str) -> Option<&Correspondence> {
        self.correspondences(direction)
            .iter()
            .find(|entry| entry.left_field == left_field)
    }

    /// Correspondences that link to a right field.
    pub fn linked(&self, direction: Direction) -> impl Iterator<Item = &Correspondence> {
        self.correspondences(direction)
            .iter()
            .filter(|entry| entry.is_linked())
    }

    pub fn is_linked(&self, direction: Direction, left_field: &str) -> bool {
        self.get(direction, left_field)
            .is_some_and(Correspondence::is_linked)
    }

    /// The linked correspondence whose left field is the identifier, if any.
    pub fn linked_identifier(&self, direction: Direction) -> Option<&Correspondence> {
        self.linked(direction)
            .find(|entry| is_identifier(&entry.left_field))
    }

    /// Removes any row keyed by `left_field` and, when `right_field` is not
    /// blank, appends a new link with the default value kind. Returns whether
    /// the list changed.
    pub fn upsert(&mut self, direction: Direction, left_field: &str, right_field: &str) -> bool {
        let list = self.lists.entry(direction).or_default();
        let linked = !right_field.trim().is_empty();

        if linked {
            let desired = Correspondence::linked(left_field, right_field);
            let mut existing = list.iter().filter(|entry| entry.left_field == left_field);
            if existing.next() == Some(&desired) && existing.next().is_none() {
                return false;
            }
        }

        let before = list.len();
        list.retain(|entry| entry.left_field != left_field);
        let removed = list.len() != before;

        if linked {
            list.push(Correspondence::linked(left_field, right_field));
            true
        } else {
            removed
        }
    }
}
