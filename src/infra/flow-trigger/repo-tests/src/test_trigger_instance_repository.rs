// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use dill::Catalog;
use kamu_flow_trigger::*;
use pretty_assertions::assert_eq;

use crate::helpers::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_empty_repository(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    assert!(repo.get_incomplete_trigger_instances().await.unwrap().is_empty());
    assert!(repo.get_recently_finished(10).await.unwrap().is_empty());
    assert!(
        repo.get_trigger_instance_by_id(&TriggerInstanceID::new_random())
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.get_trigger_instance_by_flow_execution_id(FlowExecutionID::new(1))
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(
        repo.delete_trigger_executions_finishing_older_than(t(1000))
            .await
            .unwrap(),
        0
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_upload_and_get_by_id(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let instance = make_instance(
        FLOW_ID,
        0,
        &[
            running("orders", 0),
            cancelled("payments", CancellationCause::Failure, 0, 0),
        ],
        FlowExecutionAssignment::Unassigned,
    );
    repo.upload_trigger_instance(&instance).await.unwrap();

    let loaded = repo
        .get_trigger_instance_by_id(instance.id())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary(&loaded), summary(&instance));
    assert_eq!(loaded.project(), instance.project());
    assert_eq!(loaded.submit_user(), "alice");
    assert_eq!(loaded.status(), TriggerStatus::Cancelling);
    assert!(loaded.definition().is_none());
    assert!(loaded.dependencies().iter().all(|d| d.context().is_none()));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_update_dependency_execution_status(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let mut instance = make_instance(
        FLOW_ID,
        0,
        &[running("orders", 0), running("payments", 0)],
        FlowExecutionAssignment::Unassigned,
    );
    repo.upload_trigger_instance(&instance).await.unwrap();

    let dependency = &mut instance.dependencies_mut()[1];
    dependency
        .update_status_and_cause(TriggerStatus::Cancelled, CancellationCause::Timeout, t(5))
        .unwrap();
    repo.update_dependency_execution_status(dependency)
        .await
        .unwrap();

    let loaded = repo
        .get_trigger_instance_by_id(instance.id())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary(&loaded), summary(&instance));
    assert_eq!(loaded.dependencies()[0].status(), TriggerStatus::Running);
    assert_eq!(loaded.dependencies()[1].end_time(), Some(t(5)));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_update_associated_flow_execution(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let mut instance = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 3)],
        FlowExecutionAssignment::Unassigned,
    );
    repo.upload_trigger_instance(&instance).await.unwrap();

    instance
        .assign_flow_execution(FlowExecutionID::new(501))
        .unwrap();
    repo.update_associated_flow_execution(&instance)
        .await
        .unwrap();

    let loaded = repo
        .get_trigger_instance_by_flow_execution_id(FlowExecutionID::new(501))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.id(), instance.id());
    assert_eq!(
        loaded.flow_execution(),
        FlowExecutionAssignment::Assigned(FlowExecutionID::new(501))
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_update_unknown_instance(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let instance = make_instance(
        FLOW_ID,
        0,
        &[running("orders", 0)],
        FlowExecutionAssignment::Unassigned,
    );

    assert!(matches!(
        repo.update_dependency_execution_status(&instance.dependencies()[0])
            .await,
        Err(UpdateTriggerInstanceError::NotFound(e)) if e.trigger_instance_id == *instance.id()
    ));
    assert!(matches!(
        repo.update_associated_flow_execution(&instance).await,
        Err(UpdateTriggerInstanceError::NotFound(_))
    ));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_get_incomplete_trigger_instances(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let running_late = make_instance(
        FLOW_ID,
        20,
        &[running("orders", 20)],
        FlowExecutionAssignment::Unassigned,
    );
    let cancelling = make_instance(
        FLOW_ID,
        10,
        &[
            cancelled("orders", CancellationCause::Failure, 10, 11),
            (
                "payments",
                TriggerStatus::Cancelling,
                CancellationCause::Cascading,
                10,
                None,
            ),
        ],
        FlowExecutionAssignment::Unassigned,
    );
    let awaiting_launch = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 5)],
        FlowExecutionAssignment::Unassigned,
    );
    let launched = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 5)],
        FlowExecutionAssignment::Assigned(FlowExecutionID::new(1)),
    );
    let launch_failed = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 5)],
        FlowExecutionAssignment::LaunchFailed,
    );
    let finished = make_instance(
        FLOW_ID,
        0,
        &[cancelled("orders", CancellationCause::Timeout, 0, 5)],
        FlowExecutionAssignment::Unassigned,
    );

    for instance in [
        &running_late,
        &cancelling,
        &awaiting_launch,
        &launched,
        &launch_failed,
        &finished,
    ] {
        repo.upload_trigger_instance(instance).await.unwrap();
    }

    let incomplete = repo.get_incomplete_trigger_instances().await.unwrap();
    assert_eq!(
        ids(&incomplete),
        vec![
            awaiting_launch.id().clone(),
            cancelling.id().clone(),
            running_late.id().clone(),
        ]
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_get_recently_finished(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let oldest = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 5)],
        FlowExecutionAssignment::Assigned(FlowExecutionID::new(1)),
    );
    let middle = make_instance(
        FLOW_ID,
        10,
        &[cancelled("orders", CancellationCause::Manual, 10, 12)],
        FlowExecutionAssignment::Unassigned,
    );
    let newest = make_instance(
        FLOW_ID,
        20,
        &[succeeded("orders", 20, 25)],
        FlowExecutionAssignment::LaunchFailed,
    );
    let still_running = make_instance(
        FLOW_ID,
        30,
        &[running("orders", 30)],
        FlowExecutionAssignment::Unassigned,
    );

    for instance in [&oldest, &middle, &newest, &still_running] {
        repo.upload_trigger_instance(instance).await.unwrap();
    }

    assert_eq!(
        ids(&repo.get_recently_finished(10).await.unwrap()),
        vec![newest.id().clone(), middle.id().clone(), oldest.id().clone()]
    );
    assert_eq!(
        ids(&repo.get_recently_finished(2).await.unwrap()),
        vec![newest.id().clone(), middle.id().clone()]
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_get_trigger_instances_of_flow(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let first = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 5)],
        FlowExecutionAssignment::Assigned(FlowExecutionID::new(1)),
    );
    let second = make_instance(
        FLOW_ID,
        10,
        &[running("orders", 10)],
        FlowExecutionAssignment::Unassigned,
    );
    let third = make_instance(
        FLOW_ID,
        20,
        &[running("orders", 20)],
        FlowExecutionAssignment::Unassigned,
    );
    let other_flow = make_instance(
        "hourly-report",
        30,
        &[running("orders", 30)],
        FlowExecutionAssignment::Unassigned,
    );

    for instance in [&first, &second, &third, &other_flow] {
        repo.upload_trigger_instance(instance).await.unwrap();
    }

    let page_0 = repo
        .get_trigger_instances(PROJECT_ID, FLOW_ID, PaginationOpts::from_page(0, 2))
        .await
        .unwrap();
    assert_eq!(ids(&page_0), vec![third.id().clone(), second.id().clone()]);

    let page_1 = repo
        .get_trigger_instances(PROJECT_ID, FLOW_ID, PaginationOpts::from_page(1, 2))
        .await
        .unwrap();
    assert_eq!(ids(&page_1), vec![first.id().clone()]);

    let other_project = repo
        .get_trigger_instances(PROJECT_ID + 1, FLOW_ID, PaginationOpts::from_page(0, 10))
        .await
        .unwrap();
    assert!(other_project.is_empty());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn test_delete_trigger_executions_finishing_older_than(catalog: &Catalog) {
    let repo = catalog.get_one::<dyn TriggerInstanceRepository>().unwrap();

    let expired = make_instance(
        FLOW_ID,
        0,
        &[
            succeeded("orders", 0, 5),
            cancelled("payments", CancellationCause::Manual, 0, 8),
        ],
        FlowExecutionAssignment::Unassigned,
    );
    let ends_too_late = make_instance(
        FLOW_ID,
        0,
        &[
            succeeded("orders", 0, 5),
            cancelled("payments", CancellationCause::Manual, 0, 15),
        ],
        FlowExecutionAssignment::Unassigned,
    );
    let old_but_running = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 5), running("payments", 0)],
        FlowExecutionAssignment::Unassigned,
    );
    let old_but_awaiting_launch = make_instance(
        FLOW_ID,
        0,
        &[succeeded("orders", 0, 5)],
        FlowExecutionAssignment::Unassigned,
    );

    for instance in [
        &expired,
        &ends_too_late,
        &old_but_running,
        &old_but_awaiting_launch,
    ] {
        repo.upload_trigger_instance(instance).await.unwrap();
    }

    let deleted = repo
        .delete_trigger_executions_finishing_older_than(t(10))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert!(
        repo.get_trigger_instance_by_id(expired.id())
            .await
            .unwrap()
            .is_none()
    );
    for kept in [&ends_too_late, &old_but_running, &old_but_awaiting_launch] {
        assert!(
            repo.get_trigger_instance_by_id(kept.id())
                .await
                .unwrap()
                .is_some()
        );
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
