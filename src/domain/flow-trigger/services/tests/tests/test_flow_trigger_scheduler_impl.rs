// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use dill::{Catalog, CatalogBuilder};
use kamu_flow_trigger::*;
use kamu_flow_trigger_services::FlowTriggerSchedulerImpl;
use pretty_assertions::assert_eq;
use time_source::{FakeSystemTimeSource, SystemTimeSource};
use tokio::task::JoinHandle;

use crate::tests::{FLOW_ID, FLOW_VERSION, FlowTriggerHarness, PROJECT_ID, SUBMIT_USER};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

const HOURLY: &str = "0 0 * * * *";

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_scheduled_trigger_starts_on_cron_ticks() {
    let harness = SchedulerHarness::new();
    assert_eq!(
        harness.scheduler.agent_name(),
        "dev.kamu.domain.flow-trigger.FlowTriggerScheduler"
    );

    let definition = FlowTriggerHarness::definition(&["a", "b"], Duration::hours(2));
    harness
        .scheduler
        .schedule_flow_trigger(SchedulerHarness::request(FLOW_ID, HOURLY, definition.clone()))
        .unwrap();
    assert_eq!(harness.next_activation_time(FLOW_ID), Some(harness.at(1)));

    let agent_task = harness.spawn_agent();
    harness.wait_for_sleeping_agent().await;

    harness.time_source.advance(Duration::minutes(59));
    harness.settle().await;
    assert!(harness.started().is_empty());

    harness.time_source.advance(Duration::minutes(1));
    harness.wait_for_started(1).await;

    let started = harness.started();
    assert_eq!(started[0].flow_id, FLOW_ID);
    assert_eq!(started[0].flow_version, FLOW_VERSION);
    assert_eq!(started[0].submit_user, SUBMIT_USER);
    assert_eq!(started[0].project, FlowTriggerHarness::project());
    assert!(Arc::ptr_eq(&started[0].definition, &definition));

    assert_eq!(harness.next_activation_time(FLOW_ID), Some(harness.at(2)));

    harness.time_source.advance(Duration::hours(1));
    harness.wait_for_started(2).await;

    agent_task.abort();
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_missed_ticks_start_trigger_once() {
    let harness = SchedulerHarness::new();
    harness.schedule(FLOW_ID, HOURLY);

    let agent_task = harness.spawn_agent();
    harness.wait_for_sleeping_agent().await;

    harness.time_source.advance(Duration::hours(5));
    harness.wait_for_started(1).await;
    harness.settle().await;

    assert_eq!(harness.started().len(), 1);
    assert_eq!(harness.next_activation_time(FLOW_ID), Some(harness.at(6)));

    agent_task.abort();
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_pause_and_resume() {
    let harness = SchedulerHarness::new();
    harness.schedule(FLOW_ID, HOURLY);

    let agent_task = harness.spawn_agent();
    harness.wait_for_sleeping_agent().await;

    harness
        .scheduler
        .pause_flow_trigger(PROJECT_ID, FLOW_ID)
        .unwrap();

    let scheduled = harness.scheduler.get_scheduled_flow_triggers();
    assert_eq!(scheduled.len(), 1);
    assert!(scheduled[0].is_paused);
    assert_eq!(scheduled[0].next_activation_time, None);

    harness.time_source.advance(Duration::hours(2));
    harness.settle().await;
    assert!(harness.started().is_empty());

    // Ticks missed while paused are skipped
    harness
        .scheduler
        .resume_flow_trigger(PROJECT_ID, FLOW_ID)
        .unwrap();
    assert_eq!(harness.next_activation_time(FLOW_ID), Some(harness.at(3)));
    assert!(!harness.scheduler.get_scheduled_flow_triggers()[0].is_paused);

    // Resuming an active schedule changes nothing
    harness
        .scheduler
        .resume_flow_trigger(PROJECT_ID, FLOW_ID)
        .unwrap();
    assert_eq!(harness.next_activation_time(FLOW_ID), Some(harness.at(3)));

    harness.settle().await;
    assert!(harness.started().is_empty());

    harness.time_source.advance(Duration::hours(1));
    harness.wait_for_started(1).await;
    harness.settle().await;
    assert_eq!(harness.started().len(), 1);

    agent_task.abort();
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_pause_of_unscheduled_flow() {
    let harness = SchedulerHarness::new();

    let err = harness
        .scheduler
        .pause_flow_trigger(PROJECT_ID, FLOW_ID)
        .unwrap_err();
    assert_eq!(err.project_id, PROJECT_ID);
    assert_eq!(err.flow_id, FLOW_ID);

    assert!(
        harness
            .scheduler
            .resume_flow_trigger(PROJECT_ID, FLOW_ID)
            .is_err()
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_schedule_all_and_unschedule_all() {
    let harness = SchedulerHarness::new();

    let definition = FlowTriggerHarness::definition(&["a"], Duration::hours(1));
    let flow_trigger = |flow_id: &str, cron_expression: &str| ProjectFlowTrigger {
        flow_id: flow_id.to_string(),
        flow_version: FLOW_VERSION,
        cron_expression: cron_expression.to_string(),
        definition: definition.clone(),
    };

    let num_scheduled = harness.scheduler.schedule_all(
        FlowTriggerHarness::project(),
        "bob",
        vec![
            flow_trigger("hourly-report", HOURLY),
            flow_trigger("broken", "not a cron"),
            flow_trigger("expired", "0 0 0 1 1 * 2000"),
            flow_trigger("quarterly", "*/15 * * * *"),
        ],
    );
    assert_eq!(num_scheduled, 2);

    let mut other_project = FlowTriggerHarness::project().as_ref().clone();
    other_project.project_id = PROJECT_ID + 1;
    other_project.name = "marketing".to_string();
    let num_scheduled = harness.scheduler.schedule_all(
        Arc::new(other_project),
        "carol",
        vec![flow_trigger("hourly-report", HOURLY)],
    );
    assert_eq!(num_scheduled, 1);

    let scheduled = harness.scheduler.get_scheduled_flow_triggers();
    assert_eq!(
        scheduled
            .iter()
            .map(|s| {
                (
                    s.project_id,
                    s.project_name.as_str(),
                    s.flow_id.as_str(),
                    s.submit_user.as_str(),
                    s.schedule.cron_expression(),
                    s.next_activation_time,
                )
            })
            .collect::<Vec<_>>(),
        vec![
            (
                PROJECT_ID,
                "analytics",
                "hourly-report",
                "bob",
                HOURLY,
                Some(harness.at(1))
            ),
            (
                PROJECT_ID,
                "analytics",
                "quarterly",
                "bob",
                "*/15 * * * *",
                Some(harness.t0 + Duration::minutes(15))
            ),
            (
                PROJECT_ID + 1,
                "marketing",
                "hourly-report",
                "carol",
                HOURLY,
                Some(harness.at(1))
            ),
        ]
    );

    assert_eq!(harness.scheduler.unschedule_all(PROJECT_ID), 2);
    assert_eq!(harness.scheduler.unschedule_all(PROJECT_ID), 0);

    let scheduled = harness.scheduler.get_scheduled_flow_triggers();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].project_id, PROJECT_ID + 1);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_reschedule_replaces_previous_schedule() {
    let harness = SchedulerHarness::new();
    harness.schedule(FLOW_ID, HOURLY);
    harness
        .scheduler
        .pause_flow_trigger(PROJECT_ID, FLOW_ID)
        .unwrap();

    harness.schedule(FLOW_ID, "0 30 * * * *");

    let scheduled = harness.scheduler.get_scheduled_flow_triggers();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].schedule.cron_expression(), "0 30 * * * *");
    assert!(!scheduled[0].is_paused);
    assert_eq!(
        scheduled[0].next_activation_time,
        Some(harness.t0 + Duration::minutes(30))
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_schedule_without_upcoming_activation() {
    let harness = SchedulerHarness::new();

    let res = harness.scheduler.schedule_flow_trigger(SchedulerHarness::request(
        FLOW_ID,
        "0 0 0 1 1 * 2000",
        FlowTriggerHarness::definition(&["a"], Duration::hours(1)),
    ));

    assert!(matches!(
        res,
        Err(ScheduleFlowTriggerError::NoUpcomingActivation { flow_id, .. }) if flow_id == FLOW_ID
    ));
    assert!(harness.scheduler.get_scheduled_flow_triggers().is_empty());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

struct SchedulerHarness {
    _catalog: Catalog,
    scheduler: Arc<dyn FlowTriggerScheduler>,
    time_source: FakeSystemTimeSource,
    t0: DateTime<Utc>,
    started: Arc<Mutex<Vec<StartFlowTriggerRequest>>>,
}

impl SchedulerHarness {
    fn new() -> Self {
        let t0 = FlowTriggerHarness::t0();
        let time_source = FakeSystemTimeSource::new_set(t0);

        let started = Arc::new(Mutex::new(Vec::new()));
        let mut mock_flow_trigger_service = MockFlowTriggerService::new();
        {
            let started = started.clone();
            mock_flow_trigger_service.expect_start_trigger().returning(
                move |request: StartFlowTriggerRequest| {
                    started.lock().unwrap().push(request);
                },
            );
        }

        let mut b = CatalogBuilder::new();
        b.add_value(time_source.clone())
            .bind::<dyn SystemTimeSource, FakeSystemTimeSource>()
            .add_value(mock_flow_trigger_service)
            .bind::<dyn FlowTriggerService, MockFlowTriggerService>()
            .add::<FlowTriggerSchedulerImpl>();

        let catalog = b.build();

        Self {
            scheduler: catalog.get_one().unwrap(),
            _catalog: catalog,
            time_source,
            t0,
            started,
        }
    }

    fn request(
        flow_id: &str,
        cron_expression: &str,
        definition: Arc<FlowTriggerDefinition>,
    ) -> ScheduleFlowTriggerRequest {
        ScheduleFlowTriggerRequest {
            project: FlowTriggerHarness::project(),
            flow_id: flow_id.to_string(),
            flow_version: FLOW_VERSION,
            submit_user: SUBMIT_USER.to_string(),
            schedule: FlowTriggerSchedule::try_new(cron_expression).unwrap(),
            definition,
        }
    }

    fn schedule(&self, flow_id: &str, cron_expression: &str) {
        self.scheduler
            .schedule_flow_trigger(Self::request(
                flow_id,
                cron_expression,
                FlowTriggerHarness::definition(&["a"], Duration::hours(1)),
            ))
            .unwrap();
    }

    /// Start of the given hour after `t0`
    fn at(&self, hours: i64) -> DateTime<Utc> {
        self.t0 + Duration::hours(hours)
    }

    fn next_activation_time(&self, flow_id: &str) -> Option<DateTime<Utc>> {
        self.scheduler
            .get_scheduled_flow_triggers()
            .into_iter()
            .find(|s| s.project_id == PROJECT_ID && s.flow_id == flow_id)
            .and_then(|s| s.next_activation_time)
    }

    fn started(&self) -> Vec<StartFlowTriggerRequest> {
        self.started.lock().unwrap().clone()
    }

    fn spawn_agent(&self) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            scheduler.run().await.unwrap();
        })
    }

    /// Lets the agent react to the latest changes
    async fn settle(&self) {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    async fn wait_for_sleeping_agent(&self) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while self.time_source.awaiting_callers_count() == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn wait_for_started(&self, count: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while self.started().len() < count {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
