use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::notixel::tools::error::{Result, ToolError};
use crate::notixel::tools::model::{FieldDescriptor, is_identifier};

/// Source fields without a target counterpart (case-insensitive), excluding
/// the identifier. Order follows `source_fields`.
pub fn detect_unmatched(
    source_fields: &[FieldDescriptor],
    target_fields: &[FieldDescriptor],
) -> Vec<String> {
    let target_names: HashSet<String> = target_fields
        .iter()
        .map(|field| field.name().to_lowercase())
        .collect();

    source_fields
        .iter()
        .filter(|field| !target_names.contains(&field.name().to_lowercase()))
        .filter(|field| !is_identifier(field.name()))
        .map(|field| field.name().to_string())
        .collect()
}

/// Unmatched source fields and the subset the user picked for creation on
/// the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedFields {
    candidates: Vec<String>,
    selected: Vec<String>,
}

impl UnmatchedFields {
    /// Recomputes the candidates and forgets any previous selection.
    pub fn recompute(&mut self, source_fields: &[FieldDescriptor], target_fields: &[FieldDescriptor]) {
        self.candidates = detect_unmatched(source_fields, target_fields);
        self.selected.clear();
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.selected.clear();
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Marks a candidate for creation. Returns whether the selection changed.
    pub fn set_selected(&mut self, field: &str, selected: bool) -> Result<bool> {
        if !self.candidates.iter().any(|candidate| candidate == field) {
            return Err(ToolError::UnknownField(field.to_string()));
        }
        let present = self.selected.iter().any(|name| name == field);
        Ok(match (selected, present) {
            (true, false) => {
                self.selected.push(field.to_string());
                true
            }
            (false, true) => {
                self.selected.retain(|name| name != field);
                true
            }
            _ => false,
        })
    }
}
