// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_utils::BackgroundAgent;
use chrono::{DateTime, Utc};
use dill::*;
use internal_error::InternalError;
use kamu_flow_trigger::*;
use time_source::SystemTimeSource;
use tokio::sync::Notify;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct FlowTriggerSchedulerImpl {
    flow_trigger_service: Arc<dyn FlowTriggerService>,
    time_source: Arc<dyn SystemTimeSource>,
    state: Mutex<State>,
    schedules_changed: Notify,
}

#[derive(Default)]
struct State {
    jobs: BTreeMap<(u64, String), ScheduledJob>,
}

struct ScheduledJob {
    request: ScheduleFlowTriggerRequest,
    next_activation_time: Option<DateTime<Utc>>,
    is_paused: bool,
}

impl ScheduledJob {
    fn active_activation_time(&self) -> Option<DateTime<Utc>> {
        if self.is_paused {
            None
        } else {
            self.next_activation_time
        }
    }
}

#[component(pub)]
#[interface(dyn FlowTriggerScheduler)]
#[interface(dyn BackgroundAgent)]
#[scope(Singleton)]
impl FlowTriggerSchedulerImpl {
    pub fn new(
        flow_trigger_service: Arc<dyn FlowTriggerService>,
        time_source: Arc<dyn SystemTimeSource>,
    ) -> Self {
        Self {
            flow_trigger_service,
            time_source,
            state: Mutex::new(State::default()),
            schedules_changed: Notify::new(),
        }
    }

    /// Starts every trigger whose activation time has come, and returns the
    /// closest upcoming activation
    fn start_due_triggers(&self) -> Option<DateTime<Utc>> {
        let now = self.time_source.now();

        let (due_requests, next_activation_time) = {
            let mut state = self.state.lock().unwrap();

            let mut due_requests = Vec::new();
            for job in state.jobs.values_mut() {
                let Some(activation_time) = job.active_activation_time() else {
                    continue;
                };
                if activation_time > now {
                    continue;
                }

                due_requests.push(StartFlowTriggerRequest {
                    definition: job.request.definition.clone(),
                    flow_id: job.request.flow_id.clone(),
                    flow_version: job.request.flow_version,
                    submit_user: job.request.submit_user.clone(),
                    project: job.request.project.clone(),
                });

                // Missed ticks collapse into this single start
                job.next_activation_time = job.request.schedule.next_activation_time(now);
            }

            let next_activation_time = state
                .jobs
                .values()
                .filter_map(ScheduledJob::active_activation_time)
                .min();

            (due_requests, next_activation_time)
        };

        for request in due_requests {
            tracing::info!(
                project_id = request.project.project_id,
                flow_id = %request.flow_id,
                flow_version = request.flow_version,
                "Starting scheduled flow trigger"
            );
            self.flow_trigger_service.start_trigger(request);
        }

        next_activation_time
    }

    fn update_job(
        &self,
        project_id: u64,
        flow_id: &str,
        update: impl FnOnce(&mut ScheduledJob, DateTime<Utc>),
    ) -> Result<(), FlowTriggerNotScheduledError> {
        let now = self.time_source.now();

        {
            let mut state = self.state.lock().unwrap();
            let Some(job) = state.jobs.get_mut(&(project_id, flow_id.to_string())) else {
                return Err(FlowTriggerNotScheduledError {
                    project_id,
                    flow_id: flow_id.to_string(),
                });
            };
            update(job, now);
        }

        self.schedules_changed.notify_one();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl BackgroundAgent for FlowTriggerSchedulerImpl {
    fn agent_name(&self) -> &'static str {
        "dev.kamu.domain.flow-trigger.FlowTriggerScheduler"
    }

    async fn run(&self) -> Result<(), InternalError> {
        loop {
            match self.start_due_triggers() {
                Some(next_activation_time) => {
                    let delay = next_activation_time - self.time_source.now();

                    tokio::select! {
                        () = self.time_source.sleep(delay) => {}
                        () = self.schedules_changed.notified() => {}
                    }
                }
                None => self.schedules_changed.notified().await,
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

impl FlowTriggerScheduler for FlowTriggerSchedulerImpl {
    #[tracing::instrument(level = "info", skip_all, fields(project_id = project.project_id))]
    fn schedule_all(
        &self,
        project: Arc<FlowProject>,
        submit_user: &str,
        flow_triggers: Vec<ProjectFlowTrigger>,
    ) -> usize {
        let mut num_scheduled = 0;

        for flow_trigger in flow_triggers {
            let res = FlowTriggerSchedule::try_new(flow_trigger.cron_expression)
                .map_err(ScheduleFlowTriggerError::from)
                .and_then(|schedule| {
                    self.schedule_flow_trigger(ScheduleFlowTriggerRequest {
                        project: project.clone(),
                        flow_id: flow_trigger.flow_id.clone(),
                        flow_version: flow_trigger.flow_version,
                        submit_user: submit_user.to_string(),
                        schedule,
                        definition: flow_trigger.definition,
                    })
                });

            match res {
                Ok(()) => num_scheduled += 1,
                Err(e) => {
                    tracing::error!(
                        project = %project.name,
                        flow_id = %flow_trigger.flow_id,
                        error = ?e,
                        error_msg = %e,
                        "Failed to schedule flow trigger"
                    );
                }
            }
        }

        num_scheduled
    }

    fn schedule_flow_trigger(&self, request: ScheduleFlowTriggerRequest) -> Result<(), ScheduleFlowTriggerError> {
        let Some(next_activation_time) = request
            .schedule
            .next_activation_time(self.time_source.now())
        else {
            return Err(ScheduleFlowTriggerError::NoUpcomingActivation {
                flow_id: request.flow_id,
                cron_expression: request.schedule.cron_expression().to_string(),
            });
        };

        tracing::info!(
            project_id = request.project.project_id,
            flow_id = %request.flow_id,
            cron_expression = request.schedule.cron_expression(),
            %next_activation_time,
            "Scheduling flow trigger"
        );

        {
            let mut state = self.state.lock().unwrap();
            state.jobs.insert(
                (request.project.project_id, request.flow_id.clone()),
                ScheduledJob {
                    request,
                    next_activation_time: Some(next_activation_time),
                    is_paused: false,
                },
            );
        }

        self.schedules_changed.notify_one();
        Ok(())
    }

    fn unschedule_all(&self, project_id: u64) -> usize {
        let num_removed = {
            let mut state = self.state.lock().unwrap();
            let num_before = state.jobs.len();
            state.jobs.retain(|(job_project_id, _), _| *job_project_id != project_id);
            num_before - state.jobs.len()
        };

        tracing::info!(project_id, num_removed, "Unscheduled flow triggers of project");

        self.schedules_changed.notify_one();
        num_removed
    }

    fn pause_flow_trigger(&self, project_id: u64, flow_id: &str) -> Result<(), FlowTriggerNotScheduledError> {
        tracing::info!(project_id, flow_id, "Pausing flow trigger");

        self.update_job(project_id, flow_id, |job, _| {
            job.is_paused = true;
        })
    }

    fn resume_flow_trigger(&self, project_id: u64, flow_id: &str) -> Result<(), FlowTriggerNotScheduledError> {
        tracing::info!(project_id, flow_id, "Resuming flow trigger");

        self.update_job(project_id, flow_id, |job, now| {
            if job.is_paused {
                job.is_paused = false;
                job.next_activation_time = job.request.schedule.next_activation_time(now);
            }
        })
    }

    fn get_scheduled_flow_triggers(&self) -> Vec<ScheduledFlowTrigger> {
        let state = self.state.lock().unwrap();

        state
            .jobs
            .values()
            .map(|job| ScheduledFlowTrigger {
                project_id: job.request.project.project_id,
                project_name: job.request.project.name.clone(),
                flow_id: job.request.flow_id.clone(),
                flow_version: job.request.flow_version,
                submit_user: job.request.submit_user.clone(),
                schedule: job.request.schedule.clone(),
                definition: job.request.definition.clone(),
                next_activation_time: job.active_activation_time(),
                is_paused: job.is_paused,
            })
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
