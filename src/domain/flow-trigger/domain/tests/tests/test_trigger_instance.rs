// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use kamu_flow_trigger::*;
use pretty_assertions::assert_eq;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn project() -> Arc<FlowProject> {
    Arc::new(FlowProject {
        project_id: 1,
        name: "analytics".to_string(),
        version: 3,
        last_modified_by: "alice".to_string(),
        failure_emails: HashMap::new(),
    })
}

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2050, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn stored_dependency(
    id: &TriggerInstanceID,
    name: &str,
    start: i64,
    end: Option<i64>,
    status: TriggerStatus,
    cause: CancellationCause,
) -> DependencyInstance {
    DependencyInstance::from_stored(id.clone(), name, t(start), end.map(t), status, cause)
}

fn stored_instance(id: TriggerInstanceID, dependencies: Vec<DependencyInstance>) -> TriggerInstance {
    TriggerInstance::from_stored(
        id,
        "daily-report",
        1,
        "alice",
        project(),
        t(0),
        dependencies,
        FlowExecutionAssignment::Unassigned,
    )
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_instance_without_dependencies() {
    let instance = stored_instance(TriggerInstanceID::new_random(), vec![]);

    assert_eq!(instance.status(), TriggerStatus::Succeeded);
    assert_eq!(instance.start_time(), t(0));
    assert_eq!(instance.end_time(), Some(t(0)));
    assert!(instance.is_awaiting_launch());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_start_and_end_time() {
    let id = TriggerInstanceID::new_random();
    let running = stored_instance(
        id.clone(),
        vec![
            stored_dependency(&id, "a", 5, Some(20), TriggerStatus::Succeeded, CancellationCause::None),
            stored_dependency(&id, "b", 3, None, TriggerStatus::Running, CancellationCause::None),
        ],
    );

    assert_eq!(running.status(), TriggerStatus::Running);
    assert_eq!(running.start_time(), t(3));
    assert_eq!(running.end_time(), None);

    let finished = stored_instance(
        id.clone(),
        vec![
            stored_dependency(&id, "a", 5, Some(20), TriggerStatus::Succeeded, CancellationCause::None),
            stored_dependency(&id, "b", 3, Some(30), TriggerStatus::Cancelled, CancellationCause::Timeout),
        ],
    );

    assert_eq!(finished.status(), TriggerStatus::Cancelled);
    assert_eq!(finished.start_time(), t(3));
    assert_eq!(finished.end_time(), Some(t(30)));
    assert!(!finished.is_awaiting_launch());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_resolved_cancellation_cause() {
    let id = TriggerInstanceID::new_random();
    let instance = stored_instance(
        id.clone(),
        vec![
            stored_dependency(&id, "a", 0, None, TriggerStatus::Cancelling, CancellationCause::Manual),
            stored_dependency(&id, "b", 0, Some(1), TriggerStatus::Cancelled, CancellationCause::Timeout),
        ],
    );
    assert_eq!(instance.resolved_cancellation_cause(), CancellationCause::Timeout);

    let instance = stored_instance(
        id.clone(),
        vec![
            stored_dependency(&id, "a", 0, Some(1), TriggerStatus::Cancelled, CancellationCause::Failure),
            stored_dependency(&id, "b", 0, None, TriggerStatus::Cancelling, CancellationCause::Timeout),
        ],
    );
    assert_eq!(instance.resolved_cancellation_cause(), CancellationCause::Cascading);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_flow_execution_is_assigned_at_most_once() {
    let mut instance = stored_instance(TriggerInstanceID::new_random(), vec![]);

    instance
        .assign_flow_execution(FlowExecutionID::new(42))
        .unwrap();
    assert_eq!(
        instance.flow_execution(),
        FlowExecutionAssignment::Assigned(FlowExecutionID::new(42))
    );
    assert!(!instance.is_awaiting_launch());

    assert!(instance.assign_flow_execution(FlowExecutionID::new(43)).is_err());
    assert!(instance.mark_flow_launch_failed().is_err());
    assert_eq!(
        instance.flow_execution().flow_execution_id(),
        Some(FlowExecutionID::new(42))
    );

    let mut instance = stored_instance(TriggerInstanceID::new_random(), vec![]);
    instance.mark_flow_launch_failed().unwrap();
    assert!(instance.assign_flow_execution(FlowExecutionID::new(1)).is_err());
    assert_eq!(instance.flow_execution(), FlowExecutionAssignment::LaunchFailed);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_failure_emails_per_flow() {
    let mut project = (*project()).clone();
    project.failure_emails.insert(
        "daily-report".to_string(),
        email_utils::Email::parse_list("ops@example.com").unwrap(),
    );

    assert_eq!(project.failure_emails_for("daily-report").len(), 1);
    assert!(project.failure_emails_for("other").is_empty());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
