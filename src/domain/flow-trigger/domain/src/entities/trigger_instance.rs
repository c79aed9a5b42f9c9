// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    CancellationCause,
    DependencyContextRef,
    DependencyInstance,
    FlowExecutionAlreadyAssignedError,
    FlowExecutionAssignment,
    FlowExecutionID,
    FlowProject,
    FlowTriggerDefinition,
    TriggerInstanceID,
    TriggerStatus,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// One attempt to satisfy the preconditions of a flow and launch it.
///
/// The status is never stored: it is always derived from the dependencies.
#[derive(Debug, Clone)]
pub struct TriggerInstance {
    id: TriggerInstanceID,
    flow_id: String,
    flow_version: u32,
    submit_user: String,
    project: Arc<FlowProject>,
    created_at: DateTime<Utc>,
    dependencies: Vec<DependencyInstance>,
    flow_execution: FlowExecutionAssignment,
    definition: Option<Arc<FlowTriggerDefinition>>,
}

impl TriggerInstance {
    pub fn new(
        id: TriggerInstanceID,
        flow_id: impl Into<String>,
        flow_version: u32,
        submit_user: impl Into<String>,
        project: Arc<FlowProject>,
        created_at: DateTime<Utc>,
        dependencies: Vec<DependencyInstance>,
        definition: Option<Arc<FlowTriggerDefinition>>,
    ) -> Self {
        debug_assert!(dependencies.iter().all(|d| d.trigger_instance_id() == &id));

        Self {
            id,
            flow_id: flow_id.into(),
            flow_version,
            submit_user: submit_user.into(),
            project,
            created_at,
            dependencies,
            flow_execution: FlowExecutionAssignment::Unassigned,
            definition,
        }
    }

    /// Rebuilds an instance from its stored state
    pub fn from_stored(
        id: TriggerInstanceID,
        flow_id: impl Into<String>,
        flow_version: u32,
        submit_user: impl Into<String>,
        project: Arc<FlowProject>,
        created_at: DateTime<Utc>,
        dependencies: Vec<DependencyInstance>,
        flow_execution: FlowExecutionAssignment,
    ) -> Self {
        Self {
            flow_execution,
            ..Self::new(
                id,
                flow_id,
                flow_version,
                submit_user,
                project,
                created_at,
                dependencies,
                None,
            )
        }
    }

    pub fn id(&self) -> &TriggerInstanceID {
        &self.id
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn flow_version(&self) -> u32 {
        self.flow_version
    }

    pub fn submit_user(&self) -> &str {
        &self.submit_user
    }

    pub fn project(&self) -> &Arc<FlowProject> {
        &self.project
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn dependencies(&self) -> &[DependencyInstance] {
        &self.dependencies
    }

    pub fn dependencies_mut(&mut self) -> &mut [DependencyInstance] {
        &mut self.dependencies
    }

    pub fn definition(&self) -> Option<&Arc<FlowTriggerDefinition>> {
        self.definition.as_ref()
    }

    pub fn set_definition(&mut self, definition: Arc<FlowTriggerDefinition>) {
        self.definition = Some(definition);
    }

    pub fn flow_execution(&self) -> FlowExecutionAssignment {
        self.flow_execution
    }

    pub fn status(&self) -> TriggerStatus {
        TriggerStatus::derive_from(self.dependencies.iter().map(DependencyInstance::status))
    }

    /// Cause to propagate onto dependencies that are still running
    pub fn resolved_cancellation_cause(&self) -> CancellationCause {
        CancellationCause::resolve(
            self.dependencies
                .iter()
                .map(DependencyInstance::cancellation_cause),
        )
    }

    /// Earliest start among dependencies, creation time if there are none
    pub fn start_time(&self) -> DateTime<Utc> {
        self.dependencies
            .iter()
            .map(DependencyInstance::start_time)
            .min()
            .unwrap_or(self.created_at)
    }

    /// Latest dependency end, only known once the instance is finished
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        if !self.status().is_terminal() {
            return None;
        }

        match self.dependencies.iter().map(DependencyInstance::end_time).max() {
            Some(end_time) => end_time,
            None => Some(self.created_at),
        }
    }

    /// Succeeded, but the gated flow has not been launched yet
    pub fn is_awaiting_launch(&self) -> bool {
        self.status() == TriggerStatus::Succeeded && self.flow_execution.is_unassigned()
    }

    pub fn find_dependency_by_context(&self, context: &DependencyContextRef) -> Option<usize> {
        self.dependencies.iter().position(|d| d.has_context(context))
    }

    pub fn assign_flow_execution(
        &mut self,
        flow_execution_id: FlowExecutionID,
    ) -> Result<(), FlowExecutionAlreadyAssignedError> {
        self.flow_execution
            .transition(FlowExecutionAssignment::Assigned(flow_execution_id))
    }

    pub fn mark_flow_launch_failed(&mut self) -> Result<(), FlowExecutionAlreadyAssignedError> {
        self.flow_execution
            .transition(FlowExecutionAssignment::LaunchFailed)
    }

    /// Drops plugin contexts and the definition, producing the form that gets
    /// persisted
    pub fn detached(&self) -> Self {
        Self {
            id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            flow_version: self.flow_version,
            submit_user: self.submit_user.clone(),
            project: self.project.clone(),
            created_at: self.created_at,
            dependencies: self
                .dependencies
                .iter()
                .map(DependencyInstance::detached)
                .collect(),
            flow_execution: self.flow_execution,
            definition: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
