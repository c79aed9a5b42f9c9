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

use chrono::{DateTime, Utc};
use dill::*;
use internal_error::InternalError;
use kamu_flow_trigger::*;
use tokio::sync::RwLock;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

struct TriggerInstanceRecord {
    id: TriggerInstanceID,
    flow_id: String,
    flow_version: u32,
    submit_user: String,
    project: Arc<FlowProject>,
    created_at: DateTime<Utc>,
    flow_execution: FlowExecutionAssignment,
    dependencies: Vec<DependencyExecutionRecord>,
}

struct DependencyExecutionRecord {
    dep_name: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    status: TriggerStatus,
    cancellation_cause: CancellationCause,
}

impl TriggerInstanceRecord {
    fn from_instance(instance: &TriggerInstance) -> Self {
        Self {
            id: instance.id().clone(),
            flow_id: instance.flow_id().to_string(),
            flow_version: instance.flow_version(),
            submit_user: instance.submit_user().to_string(),
            project: instance.project().clone(),
            created_at: instance.created_at(),
            flow_execution: instance.flow_execution(),
            dependencies: instance
                .dependencies()
                .iter()
                .map(DependencyExecutionRecord::from_instance)
                .collect(),
        }
    }

    fn to_instance(&self) -> TriggerInstance {
        TriggerInstance::from_stored(
            self.id.clone(),
            self.flow_id.clone(),
            self.flow_version,
            self.submit_user.clone(),
            self.project.clone(),
            self.created_at,
            self.dependencies
                .iter()
                .map(|d| {
                    DependencyInstance::from_stored(
                        self.id.clone(),
                        d.dep_name.clone(),
                        d.start_time,
                        d.end_time,
                        d.status,
                        d.cancellation_cause,
                    )
                })
                .collect(),
            self.flow_execution,
        )
    }
}

impl DependencyExecutionRecord {
    fn from_instance(dependency: &DependencyInstance) -> Self {
        Self {
            dep_name: dependency.dep_name().to_string(),
            start_time: dependency.start_time(),
            end_time: dependency.end_time(),
            status: dependency.status(),
            cancellation_cause: dependency.cancellation_cause(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Default)]
struct State {
    records: HashMap<TriggerInstanceID, TriggerInstanceRecord>,
}

impl State {
    fn instances_newest_first(&self, predicate: impl Fn(&TriggerInstance) -> bool) -> Vec<TriggerInstance> {
        let mut instances: Vec<_> = self
            .records
            .values()
            .map(TriggerInstanceRecord::to_instance)
            .filter(|instance| predicate(instance))
            .collect();

        instances.sort_by(|a, b| {
            b.start_time()
                .cmp(&a.start_time())
                .then_with(|| b.created_at().cmp(&a.created_at()))
        });
        instances
    }

    fn record_mut(
        &mut self,
        trigger_instance_id: &TriggerInstanceID,
    ) -> Result<&mut TriggerInstanceRecord, TriggerInstanceNotFoundError> {
        self.records
            .get_mut(trigger_instance_id)
            .ok_or_else(|| TriggerInstanceNotFoundError {
                trigger_instance_id: trigger_instance_id.clone(),
            })
    }
}

fn is_incomplete(instance: &TriggerInstance) -> bool {
    !instance.status().is_terminal() || instance.is_awaiting_launch()
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct InMemoryTriggerInstanceRepository {
    state: Arc<RwLock<State>>,
}

#[component(pub)]
#[interface(dyn TriggerInstanceRepository)]
#[scope(Singleton)]
impl InMemoryTriggerInstanceRepository {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl TriggerInstanceRepository for InMemoryTriggerInstanceRepository {
    async fn upload_trigger_instance(
        &self,
        trigger_instance: &TriggerInstance,
    ) -> Result<(), InternalError> {
        let mut writable_state = self.state.write().await;

        writable_state.records.insert(
            trigger_instance.id().clone(),
            TriggerInstanceRecord::from_instance(trigger_instance),
        );

        Ok(())
    }

    async fn update_dependency_execution_status(
        &self,
        dependency_instance: &DependencyInstance,
    ) -> Result<(), UpdateTriggerInstanceError> {
        let mut writable_state = self.state.write().await;

        let record = writable_state.record_mut(dependency_instance.trigger_instance_id())?;

        let Some(dependency_record) = record
            .dependencies
            .iter_mut()
            .find(|d| d.dep_name == dependency_instance.dep_name())
        else {
            return InternalError::bail(format!(
                "Dependency '{}' is not part of trigger instance '{}'",
                dependency_instance.dep_name(),
                dependency_instance.trigger_instance_id()
            ))
            .map_err(UpdateTriggerInstanceError::Internal);
        };

        dependency_record.status = dependency_instance.status();
        dependency_record.cancellation_cause = dependency_instance.cancellation_cause();
        dependency_record.end_time = dependency_instance.end_time();

        Ok(())
    }

    async fn update_associated_flow_execution(
        &self,
        trigger_instance: &TriggerInstance,
    ) -> Result<(), UpdateTriggerInstanceError> {
        let mut writable_state = self.state.write().await;

        let record = writable_state.record_mut(trigger_instance.id())?;
        record.flow_execution = trigger_instance.flow_execution();

        Ok(())
    }

    async fn get_incomplete_trigger_instances(&self) -> Result<Vec<TriggerInstance>, InternalError> {
        let readable_state = self.state.read().await;

        let mut instances = readable_state.instances_newest_first(is_incomplete);
        instances.reverse();

        Ok(instances)
    }

    async fn get_trigger_instance_by_id(
        &self,
        trigger_instance_id: &TriggerInstanceID,
    ) -> Result<Option<TriggerInstance>, InternalError> {
        let readable_state = self.state.read().await;

        Ok(readable_state
            .records
            .get(trigger_instance_id)
            .map(TriggerInstanceRecord::to_instance))
    }

    async fn get_trigger_instance_by_flow_execution_id(
        &self,
        flow_execution_id: FlowExecutionID,
    ) -> Result<Option<TriggerInstance>, InternalError> {
        let readable_state = self.state.read().await;

        Ok(readable_state
            .records
            .values()
            .find(|r| r.flow_execution.flow_execution_id() == Some(flow_execution_id))
            .map(TriggerInstanceRecord::to_instance))
    }

    async fn get_recently_finished(
        &self,
        limit: usize,
    ) -> Result<Vec<TriggerInstance>, InternalError> {
        let readable_state = self.state.read().await;

        let mut instances = readable_state.instances_newest_first(|i| !is_incomplete(i));
        instances.truncate(limit);

        Ok(instances)
    }

    async fn get_trigger_instances(
        &self,
        project_id: u64,
        flow_id: &str,
        pagination: PaginationOpts,
    ) -> Result<Vec<TriggerInstance>, InternalError> {
        let readable_state = self.state.read().await;

        Ok(readable_state
            .instances_newest_first(|i| i.project().project_id == project_id && i.flow_id() == flow_id)
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .collect())
    }

    async fn delete_trigger_executions_finishing_older_than(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<usize, InternalError> {
        let mut writable_state = self.state.write().await;

        let expired_ids: Vec<_> = writable_state
            .records
            .values()
            .map(TriggerInstanceRecord::to_instance)
            .filter(|i| !is_incomplete(i) && i.end_time().is_some_and(|end| end < older_than))
            .map(|i| i.id().clone())
            .collect();

        for id in &expired_ids {
            writable_state.records.remove(id);
        }

        Ok(expired_ids.len())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
