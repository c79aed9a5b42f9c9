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

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) const PROJECT_ID: u64 = 7;
pub(crate) const FLOW_ID: &str = "daily-report";

pub(crate) fn project() -> Arc<FlowProject> {
    Arc::new(FlowProject {
        project_id: PROJECT_ID,
        name: "analytics".to_string(),
        version: 1,
        last_modified_by: "alice".to_string(),
        failure_emails: HashMap::new(),
    })
}

pub(crate) fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Dependency as (name, status, cause, start minute, end minute)
pub(crate) type DependencySpec = (
    &'static str,
    TriggerStatus,
    CancellationCause,
    i64,
    Option<i64>,
);

pub(crate) fn make_instance(
    flow_id: &str,
    created_at: i64,
    dependencies: &[DependencySpec],
    flow_execution: FlowExecutionAssignment,
) -> TriggerInstance {
    let id = TriggerInstanceID::new_random();

    TriggerInstance::from_stored(
        id.clone(),
        flow_id,
        1,
        "alice",
        project(),
        t(created_at),
        dependencies
            .iter()
            .map(|(name, status, cause, start, end)| {
                DependencyInstance::from_stored(
                    id.clone(),
                    *name,
                    t(*start),
                    end.map(t),
                    *status,
                    *cause,
                )
            })
            .collect(),
        flow_execution,
    )
}

pub(crate) fn running(name: &'static str, start: i64) -> DependencySpec {
    (name, TriggerStatus::Running, CancellationCause::None, start, None)
}

pub(crate) fn succeeded(name: &'static str, start: i64, end: i64) -> DependencySpec {
    (name, TriggerStatus::Succeeded, CancellationCause::None, start, Some(end))
}

pub(crate) fn cancelled(
    name: &'static str,
    cause: CancellationCause,
    start: i64,
    end: i64,
) -> DependencySpec {
    (name, TriggerStatus::Cancelled, cause, start, Some(end))
}

pub(crate) fn ids(instances: &[TriggerInstance]) -> Vec<TriggerInstanceID> {
    instances.iter().map(|i| i.id().clone()).collect()
}

pub(crate) type DependencySummary = (
    String,
    TriggerStatus,
    CancellationCause,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

pub(crate) type InstanceSummary = (
    TriggerInstanceID,
    String,
    FlowExecutionAssignment,
    Vec<DependencySummary>,
);

/// Comparable projection of a stored instance
pub(crate) fn summary(instance: &TriggerInstance) -> InstanceSummary {
    (
        instance.id().clone(),
        instance.flow_id().to_string(),
        instance.flow_execution(),
        instance
            .dependencies()
            .iter()
            .map(|d| {
                (
                    d.dep_name().to_string(),
                    d.status(),
                    d.cancellation_cause(),
                    d.start_time(),
                    d.end_time(),
                )
            })
            .collect(),
    )
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
