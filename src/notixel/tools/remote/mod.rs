//! Boundary to the remote sync service.
//!
//! The orchestrator and the session loader only see the traits declared here;
//! [`http::HttpRemote`] implements all of them against the service's HTTP API
//! and tests substitute recording fakes.

pub mod http;
pub mod wire;

use async_trait::async_trait;

use crate::notixel::tools::error::Result;
use crate::notixel::tools::model::{
    FieldDescriptor, MappingRecord, PersistedCorrespondence, RecurringJob, RecurringJobRequest,
    SourceFile, TransferRequest,
};

pub use http::HttpRemote;

/// Operations a synchronization run depends on.
#[async_trait]
pub trait SyncRemote: Send + Sync {
    /// Stores the linked correspondences and returns them with their ids.
    async fn persist_mappings(
        &self,
        user_id: i64,
        records: &[MappingRecord],
    ) -> Result<Vec<PersistedCorrespondence>>;

    /// Runs one immediate transfer.
    async fn trigger_transfer(&self, request: &TransferRequest) -> Result<()>;

    /// Registers a recurring job and returns the service's confirmation text.
    async fn register_recurring(&self, request: &RecurringJobRequest) -> Result<String>;
}

/// Lookups used to fill the source and target snapshots.
#[async_trait]
pub trait SchemaRemote: Send + Sync {
    async fn target_connected(&self, user_id: i64) -> Result<bool>;

    async fn source_files(&self, user_id: i64) -> Result<Vec<SourceFile>>;

    async fn worksheets(&self, user_id: i64, file_id: &str) -> Result<Vec<String>>;

    async fn source_fields(
        &self,
        user_id: i64,
        file_id: &str,
        worksheet: &str,
    ) -> Result<Vec<FieldDescriptor>>;

    async fn target_fields(&self, database_id: &str) -> Result<Vec<FieldDescriptor>>;
}

/// Management of registered recurring jobs.
#[async_trait]
pub trait JobsRemote: Send + Sync {
    async fn list_jobs(&self, user_id: i64) -> Result<Vec<RecurringJob>>;

    async fn trigger_job(&self, job_id: i64) -> Result<String>;

    async fn delete_job(&self, job_id: i64) -> Result<()>;

    /// Takes one mapping out of a job's recurring transfer.
    async fn disable_job_mapping(&self, mapping_id: i64, job_id: i64) -> Result<String>;
}
