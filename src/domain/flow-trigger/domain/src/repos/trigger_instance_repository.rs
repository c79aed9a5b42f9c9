// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::{DateTime, Utc};
use internal_error::InternalError;
use thiserror::Error;

use crate::{DependencyInstance, FlowExecutionID, TriggerInstance, TriggerInstanceID};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Durable store of trigger instances and their dependency executions.
///
/// Stored instances carry neither plugin contexts nor definitions.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait::async_trait]
pub trait TriggerInstanceRepository: Send + Sync {
    /// Saves a freshly created instance with all its dependencies
    async fn upload_trigger_instance(
        &self,
        trigger_instance: &TriggerInstance,
    ) -> Result<(), InternalError>;

    /// Saves status, cancellation cause and end time of one dependency
    async fn update_dependency_execution_status(
        &self,
        dependency_instance: &DependencyInstance,
    ) -> Result<(), UpdateTriggerInstanceError>;

    /// Saves the flow execution assignment of an instance
    async fn update_associated_flow_execution(
        &self,
        trigger_instance: &TriggerInstance,
    ) -> Result<(), UpdateTriggerInstanceError>;

    /// Instances with a running or cancelling dependency, plus succeeded
    /// instances whose flow was never launched. Ordered by start time,
    /// oldest first.
    async fn get_incomplete_trigger_instances(&self) -> Result<Vec<TriggerInstance>, InternalError>;

    async fn get_trigger_instance_by_id(
        &self,
        trigger_instance_id: &TriggerInstanceID,
    ) -> Result<Option<TriggerInstance>, InternalError>;

    async fn get_trigger_instance_by_flow_execution_id(
        &self,
        flow_execution_id: FlowExecutionID,
    ) -> Result<Option<TriggerInstance>, InternalError>;

    /// Finished instances, newest start time first
    async fn get_recently_finished(&self, limit: usize)
    -> Result<Vec<TriggerInstance>, InternalError>;

    /// All instances of one flow, newest start time first
    async fn get_trigger_instances(
        &self,
        project_id: u64,
        flow_id: &str,
        pagination: PaginationOpts,
    ) -> Result<Vec<TriggerInstance>, InternalError>;

    /// Removes finished instances that ended before the given moment.
    /// Returns the number of removed instances.
    async fn delete_trigger_executions_finishing_older_than(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<usize, InternalError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationOpts {
    pub limit: usize,
    pub offset: usize,
}

impl PaginationOpts {
    pub fn from_page(page: usize, per_page: usize) -> Self {
        Self {
            offset: page * per_page,
            limit: per_page,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum UpdateTriggerInstanceError {
    #[error(transparent)]
    NotFound(#[from] TriggerInstanceNotFoundError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
#[error("Trigger instance '{trigger_instance_id}' not found")]
pub struct TriggerInstanceNotFoundError {
    pub trigger_instance_id: TriggerInstanceID,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
