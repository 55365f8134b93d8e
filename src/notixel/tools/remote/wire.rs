//! Response bodies of the sync service.

use serde::Deserialize;

use crate::notixel::tools::model::{FieldDescriptor, PersistedCorrespondence, SourceFile};

#[derive(Debug, Deserialize)]
pub struct SavedMappingsResponse {
    #[serde(default)]
    pub saved_mappings: Vec<PersistedCorrespondence>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Failure body. The service reports problems under either key.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Which keys of an [`ErrorBody`] an endpoint's failure text is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKeys {
    /// `error`, then `detail`.
    ErrorFirst,
    /// `detail`, then `error`. Used by the transfer endpoint.
    DetailFirst,
    /// `detail` only. Used by recurring-job registration.
    DetailOnly,
}

impl ErrorBody {
    pub fn into_message(self, keys: ErrorKeys) -> Option<String> {
        match keys {
            ErrorKeys::ErrorFirst => self.error.or(self.detail),
            ErrorKeys::DetailFirst => self.detail.or(self.error),
            ErrorKeys::DetailOnly => self.detail,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FilesResponse {
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Deserialize)]
pub struct WorksheetsResponse {
    #[serde(default)]
    pub worksheets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnsResponse {
    #[serde(default)]
    pub columns: Vec<String>,
}

impl ColumnsResponse {
    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        self.columns.into_iter().map(FieldDescriptor::source).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct PropertiesResponse {
    #[serde(default)]
    pub properties: Vec<PropertyBody>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyBody {
    pub name: String,
    #[serde(default, rename = "type")]
    pub declared_type: Option<String>,
}

impl PropertiesResponse {
    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        self.properties
            .into_iter()
            .map(|property| FieldDescriptor::target(property.name, property.declared_type))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct NotionStatusResponse {
    #[serde(default)]
    pub has_notion_key: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_keys() -> ErrorBody {
        serde_json::from_str(r#"{"error":"quota exceeded","detail":"database archived"}"#)
            .expect("body parsed")
    }

    #[test]
    fn key_precedence_follows_the_endpoint() {
        assert_eq!(
            both_keys().into_message(ErrorKeys::ErrorFirst).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            both_keys().into_message(ErrorKeys::DetailFirst).as_deref(),
            Some("database archived")
        );
        assert_eq!(
            both_keys().into_message(ErrorKeys::DetailOnly).as_deref(),
            Some("database archived")
        );
    }

    #[test]
    fn missing_keys_fall_back_where_allowed() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail":"Not Found"}"#).expect("parsed");
        assert_eq!(body.into_message(ErrorKeys::ErrorFirst).as_deref(), Some("Not Found"));

        let body: ErrorBody = serde_json::from_str(r#"{"error":"boom"}"#).expect("parsed");
        assert_eq!(body.into_message(ErrorKeys::DetailFirst).as_deref(), Some("boom"));

        let body: ErrorBody = serde_json::from_str(r#"{"error":"boom"}"#).expect("parsed");
        assert_eq!(body.into_message(ErrorKeys::DetailOnly), None);
    }

    #[test]
    fn properties_keep_declared_types() {
        let response: PropertiesResponse = serde_json::from_str(
            r#"{"properties":[{"name":"id","type":"rich_text"},{"name":"Tags"}]}"#,
        )
        .expect("properties parsed");
        let fields = response.into_fields();
        assert_eq!(fields[0].declared_type(), Some("rich_text"));
        assert_eq!(fields[1].declared_type(), None);
    }
}
