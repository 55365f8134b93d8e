//! Task-owned mapping session for hosts with several concurrent callers.
//!
//! One tokio task owns the [`MappingSession`]; callers send commands over a
//! channel and await the reply, so edits and sync runs never interleave.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::notixel::tools::error::{Result, ToolError};
use crate::notixel::tools::mapping::{MappingSession, Notice, SessionView};
use crate::notixel::tools::model::{Direction, FieldDescriptor};
use crate::notixel::tools::remote::SyncRemote;
use crate::notixel::tools::sync::{SyncEndpoints, SyncOrchestrator, SyncOutcome, SyncPlan};

const COMMAND_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
enum SessionCommand {
    SetDirection {
        direction: Direction,
        reply: Reply<Vec<Notice>>,
    },
    LoadSourceFields {
        fields: Vec<FieldDescriptor>,
        reply: Reply<Result<Vec<Notice>>>,
    },
    LoadTargetFields {
        fields: Vec<FieldDescriptor>,
        reply: Reply<Vec<Notice>>,
    },
    SetCorrespondence {
        left_field: String,
        right_field: String,
        reply: Reply<Result<Vec<Notice>>>,
    },
    SetRecurringEnabled {
        enabled: bool,
        reply: Reply<Vec<Notice>>,
    },
    SetRecurringIncluded {
        left_field: String,
        included: bool,
        reply: Reply<Vec<Notice>>,
    },
    SetCreateField {
        field: String,
        selected: bool,
        reply: Reply<Result<()>>,
    },
    Snapshot {
        reply: Reply<SessionView>,
    },
    Run {
        endpoints: SyncEndpoints,
        interval_minutes: u32,
        reply: Reply<SyncOutcome>,
    },
}

/// Cloneable handle to a session owned by a background task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Moves `session` into a new task. Must be called inside a tokio runtime.
    pub fn spawn(session: MappingSession, remote: Arc<dyn SyncRemote>) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(actor_loop(session, remote, rx));
        info!("mapping session task spawned");
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| ToolError::SessionClosed)?;
        reply_rx.await.map_err(|_| ToolError::SessionClosed)
    }

    pub async fn set_direction(&self, direction: Direction) -> Result<Vec<Notice>> {
        self.request(|reply| SessionCommand::SetDirection { direction, reply })
            .await
    }

    pub async fn load_source_fields(&self, fields: Vec<FieldDescriptor>) -> Result<Vec<Notice>> {
        self.request(|reply| SessionCommand::LoadSourceFields { fields, reply })
            .await?
    }

    pub async fn load_target_fields(&self, fields: Vec<FieldDescriptor>) -> Result<Vec<Notice>> {
        self.request(|reply| SessionCommand::LoadTargetFields { fields, reply })
            .await
    }

    pub async fn set_correspondence(
        &self,
        left_field: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Result<Vec<Notice>> {
        let left_field = left_field.into();
        let right_field = right_field.into();
        self.request(|reply| SessionCommand::SetCorrespondence {
            left_field,
            right_field,
            reply,
        })
        .await?
    }

    pub async fn set_recurring_enabled(&self, enabled: bool) -> Result<Vec<Notice>> {
        self.request(|reply| SessionCommand::SetRecurringEnabled { enabled, reply })
            .await
    }

    pub async fn set_recurring_included(
        &self,
        left_field: impl Into<String>,
        included: bool,
    ) -> Result<Vec<Notice>> {
        let left_field = left_field.into();
        self.request(|reply| SessionCommand::SetRecurringIncluded {
            left_field,
            included,
            reply,
        })
        .await
    }

    pub async fn set_create_field(&self, field: impl Into<String>, selected: bool) -> Result<()> {
        let field = field.into();
        self.request(|reply| SessionCommand::SetCreateField {
            field,
            selected,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<SessionView> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Runs a sync of the session's current state. Commands sent meanwhile
    /// wait until the run has finished.
    pub async fn run(&self, endpoints: SyncEndpoints, interval_minutes: u32) -> Result<SyncOutcome> {
        self.request(|reply| SessionCommand::Run {
            endpoints,
            interval_minutes,
            reply,
        })
        .await
    }
}

async fn actor_loop(
    mut session: MappingSession,
    remote: Arc<dyn SyncRemote>,
    mut rx: mpsc::Receiver<SessionCommand>,
) {
    while let Some(command) = rx.recv().await {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            SessionCommand::SetDirection { direction, reply } => {
                let _ = reply.send(session.set_direction(direction));
            }
            SessionCommand::LoadSourceFields { fields, reply } => {
                let _ = reply.send(session.load_source_fields(fields));
            }
            SessionCommand::LoadTargetFields { fields, reply } => {
                let _ = reply.send(session.load_target_fields(fields));
            }
            SessionCommand::SetCorrespondence {
                left_field,
                right_field,
                reply,
            } => {
                let _ = reply.send(session.set_correspondence(&left_field, &right_field));
            }
            SessionCommand::SetRecurringEnabled { enabled, reply } => {
                let _ = reply.send(session.set_recurring_enabled(enabled));
            }
            SessionCommand::SetRecurringIncluded {
                left_field,
                included,
                reply,
            } => {
                let _ = reply.send(session.set_recurring_included(&left_field, included));
            }
            SessionCommand::SetCreateField {
                field,
                selected,
                reply,
            } => {
                let _ = reply.send(session.set_create_field(&field, selected));
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(session.view());
            }
            SessionCommand::Run {
                endpoints,
                interval_minutes,
                reply,
            } => {
                let plan = SyncPlan::from_session(&session, endpoints, interval_minutes);
                let mut orchestrator = SyncOrchestrator::new(remote.as_ref());
                let outcome = orchestrator.run(&plan).await;
                let _ = reply.send(outcome);
            }
        }
    }
    debug!("mapping session task stopped");
}
