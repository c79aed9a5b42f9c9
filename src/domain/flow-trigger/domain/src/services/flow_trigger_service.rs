// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use internal_error::InternalError;
use thiserror::Error;

use crate::{
    CancellationCause,
    DependencyInstanceContext,
    FlowExecutionID,
    FlowProject,
    FlowTriggerDefinition,
    LoadDependencyPluginsError,
    PaginationOpts,
    TriggerInstance,
    TriggerInstanceID,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Creates, tracks, cancels and recovers dependency-gated flow launches.
///
/// Mutating operations only enqueue work and return immediately. Failures
/// are logged, not reported back to the caller.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait::async_trait]
pub trait FlowTriggerService: Send + Sync {
    /// Loads dependency plugins, recovers unfinished instances from the
    /// store and starts background processing
    async fn start(&self) -> Result<(), FlowTriggerServiceStartError>;

    fn start_trigger(&self, request: StartFlowTriggerRequest);

    /// Cancels an active instance. Ignored when the instance is not running.
    fn cancel_trigger_instance(&self, trigger_instance_id: &TriggerInstanceID, cause: CancellationCause);

    fn mark_dependency_success(&self, context: Arc<dyn DependencyInstanceContext>);

    fn mark_dependency_cancelled(&self, context: Arc<dyn DependencyInstanceContext>);

    /// Snapshot of the active instances
    async fn get_running_triggers(&self) -> Result<Vec<TriggerInstance>, InternalError>;

    async fn find_running_trigger_instance_by_id(
        &self,
        trigger_instance_id: &TriggerInstanceID,
    ) -> Result<Option<TriggerInstance>, InternalError>;

    async fn get_recently_finished(&self) -> Result<Vec<TriggerInstance>, InternalError>;

    async fn find_trigger_instance_by_id(
        &self,
        trigger_instance_id: &TriggerInstanceID,
    ) -> Result<Option<TriggerInstance>, InternalError>;

    async fn find_trigger_instance_by_flow_execution_id(
        &self,
        flow_execution_id: FlowExecutionID,
    ) -> Result<Option<TriggerInstance>, InternalError>;

    async fn get_trigger_instances(
        &self,
        project_id: u64,
        flow_id: &str,
        pagination: PaginationOpts,
    ) -> Result<Vec<TriggerInstance>, InternalError>;

    /// Stops accepting work and waits for the command in progress to
    /// complete. Pending timeouts are dropped and plugins are shut down.
    /// Running dependency checks are left alone.
    async fn shutdown(&self);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
pub struct StartFlowTriggerRequest {
    pub definition: Arc<FlowTriggerDefinition>,
    pub flow_id: String,
    pub flow_version: u32,
    pub submit_user: String,
    pub project: Arc<FlowProject>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum FlowTriggerServiceStartError {
    #[error("Flow trigger service is already started")]
    AlreadyStarted,

    #[error(transparent)]
    LoadPlugins(#[from] LoadDependencyPluginsError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
