use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::notixel::tools::config::ClientConfig;
use crate::notixel::tools::error::{Result, ToolError};
use crate::notixel::tools::model::{
    FieldDescriptor, MappingRecord, PersistedCorrespondence, RecurringJob, RecurringJobRequest,
    SourceFile, TransferRequest,
};
use crate::notixel::tools::remote::wire::{
    ColumnsResponse, ErrorBody, ErrorKeys, FilesResponse, MessageResponse, NotionStatusResponse,
    PropertiesResponse, SavedMappingsResponse, WorksheetsResponse,
};
use crate::notixel::tools::remote::{JobsRemote, SchemaRemote, SyncRemote};

/// Client for the sync service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    http: Client,
}

impl HttpRemote {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let http = builder.build()?;
        Ok(Self {
            base_url: config.base_url().to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send_json_reading(request, ErrorKeys::ErrorFirst).await
    }

    async fn send_json_reading<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        keys: ErrorKeys,
    ) -> Result<T> {
        let response = check_status(request.send().await?, keys).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_message(&self, request: RequestBuilder, keys: ErrorKeys) -> Result<String> {
        let body: MessageResponse = self.send_json_reading(request, keys).await?;
        Ok(body.message.unwrap_or_default())
    }
}

/// Turns a non-success response into [`ToolError::Server`], reading the
/// service's error text from `keys` when the body carries one.
async fn check_status(response: Response, keys: ErrorKeys) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.into_message(keys),
        Err(error) => {
            debug!(%error, "error body could not be parsed");
            None
        }
    };
    warn!(status = status.as_u16(), message = message.as_deref().unwrap_or(""), "request rejected");
    Err(ToolError::Server {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SyncRemote for HttpRemote {
    #[instrument(level = "debug", skip_all, fields(user_id = user_id, records = records.len()))]
    async fn persist_mappings(
        &self,
        user_id: i64,
        records: &[MappingRecord],
    ) -> Result<Vec<PersistedCorrespondence>> {
        let request = self
            .http
            .post(self.url("/save-mapping"))
            .query(&[("user_id", user_id)])
            .json(records);
        let body: SavedMappingsResponse = self.send_json(request).await?;
        Ok(body.saved_mappings)
    }

    #[instrument(level = "debug", skip_all, fields(direction = %request.direction))]
    async fn trigger_transfer(&self, request: &TransferRequest) -> Result<()> {
        let builder = self
            .http
            .post(self.url(&format!("/sync/{}", request.direction)))
            .json(request);
        check_status(builder.send().await?, ErrorKeys::DetailFirst).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(interval = request.interval_minutes))]
    async fn register_recurring(&self, request: &RecurringJobRequest) -> Result<String> {
        let builder = self.http.post(self.url("/autosync/create")).json(request);
        self.send_message(builder, ErrorKeys::DetailOnly).await
    }
}

#[async_trait]
impl SchemaRemote for HttpRemote {
    async fn target_connected(&self, user_id: i64) -> Result<bool> {
        let request = self
            .http
            .get(self.url("/check-notion-status"))
            .query(&[("user_id", user_id)]);
        let body: NotionStatusResponse = self.send_json(request).await?;
        Ok(body.has_notion_key)
    }

    async fn source_files(&self, user_id: i64) -> Result<Vec<SourceFile>> {
        let request = self
            .http
            .get(self.url("/get-excel-files"))
            .query(&[("user_id", user_id)]);
        let body: FilesResponse = self.send_json(request).await?;
        Ok(body.files)
    }

    async fn worksheets(&self, user_id: i64, file_id: &str) -> Result<Vec<String>> {
        let user = user_id.to_string();
        let request = self
            .http
            .get(self.url("/get-excel-worksheets"))
            .query(&[("excel_file_id", file_id), ("user_id", user.as_str())]);
        let body: WorksheetsResponse = self.send_json(request).await?;
        Ok(body.worksheets)
    }

    async fn source_fields(
        &self,
        user_id: i64,
        file_id: &str,
        worksheet: &str,
    ) -> Result<Vec<FieldDescriptor>> {
        let user = user_id.to_string();
        let request = self.http.get(self.url("/get-excel-columns")).query(&[
            ("excel_file_id", file_id),
            ("worksheet_name", worksheet),
            ("user_id", user.as_str()),
        ]);
        let body: ColumnsResponse = self.send_json(request).await?;
        Ok(body.into_fields())
    }

    async fn target_fields(&self, database_id: &str) -> Result<Vec<FieldDescriptor>> {
        let request = self
            .http
            .get(self.url("/get-notion-properties"))
            .query(&[("notion_database_id", database_id)]);
        let body: PropertiesResponse = self.send_json(request).await?;
        Ok(body.into_fields())
    }
}

#[async_trait]
impl JobsRemote for HttpRemote {
    async fn list_jobs(&self, user_id: i64) -> Result<Vec<RecurringJob>> {
        let request = self.http.get(self.url(&format!("/autosync/list/{user_id}")));
        self.send_json(request).await
    }

    async fn trigger_job(&self, job_id: i64) -> Result<String> {
        let request = self.http.post(self.url(&format!("/autosync/trigger/{job_id}")));
        self.send_message(request, ErrorKeys::ErrorFirst).await
    }

    async fn delete_job(&self, job_id: i64) -> Result<()> {
        let request = self.http.delete(self.url(&format!("/autosync/delete/{job_id}")));
        check_status(request.send().await?, ErrorKeys::ErrorFirst).await?;
        Ok(())
    }

    async fn disable_job_mapping(&self, mapping_id: i64, job_id: i64) -> Result<String> {
        let request = self.http.post(self.url(&format!(
            "/autosync/mapping/disable/{mapping_id}/{job_id}"
        )));
        self.send_message(request, ErrorKeys::ErrorFirst).await
    }
}
