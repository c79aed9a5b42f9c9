// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_utils::BackgroundAgent;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{FlowProject, FlowTriggerDefinition, FlowTriggerSchedule, InvalidFlowTriggerScheduleError};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Starts new trigger instances of flows on their cron schedules.
///
/// At most one schedule exists per `(project_id, flow_id)`. When ticks are
/// missed (the agent was busy or the clock jumped) the flow trigger is started
/// once and the schedule continues from the current time.
pub trait FlowTriggerScheduler: BackgroundAgent {
    /// Schedules every listed flow of the project. A flow that can't be
    /// scheduled is logged and skipped. Returns the number of scheduled flows.
    fn schedule_all(
        &self,
        project: Arc<FlowProject>,
        submit_user: &str,
        flow_triggers: Vec<ProjectFlowTrigger>,
    ) -> usize;

    /// Schedules a single flow, replacing its previous schedule
    fn schedule_flow_trigger(&self, request: ScheduleFlowTriggerRequest) -> Result<(), ScheduleFlowTriggerError>;

    /// Removes all schedules of the project, returns how many were removed
    fn unschedule_all(&self, project_id: u64) -> usize;

    fn pause_flow_trigger(&self, project_id: u64, flow_id: &str) -> Result<(), FlowTriggerNotScheduledError>;

    /// Ticks missed while paused are skipped
    fn resume_flow_trigger(&self, project_id: u64, flow_id: &str) -> Result<(), FlowTriggerNotScheduledError>;

    /// Ordered by project id, then flow id
    fn get_scheduled_flow_triggers(&self) -> Vec<ScheduledFlowTrigger>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Trigger declaration of one flow of a project, as uploaded
#[derive(Debug, Clone)]
pub struct ProjectFlowTrigger {
    pub flow_id: String,
    pub flow_version: u32,
    pub cron_expression: String,
    pub definition: Arc<FlowTriggerDefinition>,
}

#[derive(Debug, Clone)]
pub struct ScheduleFlowTriggerRequest {
    pub project: Arc<FlowProject>,
    pub flow_id: String,
    pub flow_version: u32,
    pub submit_user: String,
    pub schedule: FlowTriggerSchedule,
    pub definition: Arc<FlowTriggerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledFlowTrigger {
    pub project_id: u64,
    pub project_name: String,
    pub flow_id: String,
    pub flow_version: u32,
    pub submit_user: String,
    pub schedule: FlowTriggerSchedule,
    pub definition: Arc<FlowTriggerDefinition>,
    /// Not set while paused
    pub next_activation_time: Option<DateTime<Utc>>,
    pub is_paused: bool,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum ScheduleFlowTriggerError {
    #[error(transparent)]
    InvalidSchedule(#[from] InvalidFlowTriggerScheduleError),

    #[error("Schedule '{cron_expression}' of flow '{flow_id}' never fires again")]
    NoUpcomingActivation {
        flow_id: String,
        cron_expression: String,
    },
}

#[derive(Error, Debug)]
#[error("Flow '{flow_id}' of project {project_id} has no scheduled trigger")]
pub struct FlowTriggerNotScheduledError {
    pub project_id: u64,
    pub flow_id: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
