// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{CancellationCause, DependencyContextRef, TriggerInstanceID, TriggerStatus};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runtime tracking of one dependency check within a trigger instance.
///
/// Once the status becomes terminal the instance is frozen: every mutating
/// method returns [`DependencyInstanceTerminalError`]. A dependency that left
/// `Running` never returns to it.
#[derive(Debug, Clone)]
pub struct DependencyInstance {
    trigger_instance_id: TriggerInstanceID,
    dep_name: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    status: TriggerStatus,
    cancellation_cause: CancellationCause,
    context: Option<DependencyContextRef>,
}

impl DependencyInstance {
    /// A dependency whose check was started successfully
    pub fn new_running(
        trigger_instance_id: TriggerInstanceID,
        dep_name: impl Into<String>,
        start_time: DateTime<Utc>,
        context: DependencyContextRef,
    ) -> Self {
        Self {
            trigger_instance_id,
            dep_name: dep_name.into(),
            start_time,
            end_time: None,
            status: TriggerStatus::Running,
            cancellation_cause: CancellationCause::None,
            context: Some(context),
        }
    }

    /// A dependency whose check could not even be started
    pub fn new_failed(
        trigger_instance_id: TriggerInstanceID,
        dep_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            trigger_instance_id,
            dep_name: dep_name.into(),
            start_time,
            end_time: Some(end_time),
            status: TriggerStatus::Cancelled,
            cancellation_cause: CancellationCause::Failure,
            context: None,
        }
    }

    /// Rebuilds a dependency from its stored state. Plugin contexts never
    /// survive persistence.
    pub fn from_stored(
        trigger_instance_id: TriggerInstanceID,
        dep_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        status: TriggerStatus,
        cancellation_cause: CancellationCause,
    ) -> Self {
        Self {
            trigger_instance_id,
            dep_name: dep_name.into(),
            start_time,
            end_time,
            status,
            cancellation_cause,
            context: None,
        }
    }

    pub fn trigger_instance_id(&self) -> &TriggerInstanceID {
        &self.trigger_instance_id
    }

    pub fn dep_name(&self) -> &str {
        &self.dep_name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn status(&self) -> TriggerStatus {
        self.status
    }

    pub fn cancellation_cause(&self) -> CancellationCause {
        self.cancellation_cause
    }

    pub fn context(&self) -> Option<&DependencyContextRef> {
        self.context.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_context(&self, context: &DependencyContextRef) -> bool {
        self.context.as_ref() == Some(context)
    }

    /// Engine asked the plugin to stop, and the plugin has not confirmed yet
    pub fn is_cancellation_requested_by_engine(&self) -> bool {
        self.status == TriggerStatus::Cancelling && self.cancellation_cause.is_requested_by_engine()
    }

    pub fn set_context(
        &mut self,
        context: DependencyContextRef,
    ) -> Result<(), DependencyInstanceTerminalError> {
        self.ensure_not_terminal()?;
        self.context = Some(context);
        Ok(())
    }

    /// Changes the status keeping the current cancellation cause
    pub fn update_status(
        &mut self,
        status: TriggerStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DependencyInstanceUpdateError> {
        self.update_status_and_cause(status, self.cancellation_cause, now)
    }

    pub fn update_status_and_cause(
        &mut self,
        status: TriggerStatus,
        cancellation_cause: CancellationCause,
        now: DateTime<Utc>,
    ) -> Result<(), DependencyInstanceUpdateError> {
        self.ensure_not_terminal()?;

        if status == TriggerStatus::Running && self.status != TriggerStatus::Running {
            return Err(DependencyInstanceBackToRunningError {
                trigger_instance_id: self.trigger_instance_id.clone(),
                dep_name: self.dep_name.clone(),
                status: self.status,
            }
            .into());
        }

        self.status = status;
        self.cancellation_cause = cancellation_cause;
        if status.is_terminal() {
            self.end_time = Some(now);
        }
        Ok(())
    }

    /// Drops the plugin context, producing the form that gets persisted
    pub fn detached(&self) -> Self {
        Self {
            context: None,
            ..self.clone()
        }
    }

    fn ensure_not_terminal(&self) -> Result<(), DependencyInstanceTerminalError> {
        if self.status.is_terminal() {
            Err(DependencyInstanceTerminalError {
                trigger_instance_id: self.trigger_instance_id.clone(),
                dep_name: self.dep_name.clone(),
                status: self.status,
            })
        } else {
            Ok(())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error(
    "Dependency '{dep_name}' of trigger instance '{trigger_instance_id}' is already finished with \
     status {status}"
)]
pub struct DependencyInstanceTerminalError {
    pub trigger_instance_id: TriggerInstanceID,
    pub dep_name: String,
    pub status: TriggerStatus,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error(
    "Dependency '{dep_name}' of trigger instance '{trigger_instance_id}' can't return to running \
     from status {status}"
)]
pub struct DependencyInstanceBackToRunningError {
    pub trigger_instance_id: TriggerInstanceID,
    pub dep_name: String,
    pub status: TriggerStatus,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum DependencyInstanceUpdateError {
    #[error(transparent)]
    Terminal(#[from] DependencyInstanceTerminalError),

    #[error(transparent)]
    BackToRunning(#[from] DependencyInstanceBackToRunningError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
