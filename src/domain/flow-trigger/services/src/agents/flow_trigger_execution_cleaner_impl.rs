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
use dill::*;
use internal_error::InternalError;
use kamu_flow_trigger::{
    FlowTriggerExecutionCleaner,
    FlowTriggerExecutionCleanerConfig,
    TriggerInstanceRepository,
};
use time_source::SystemTimeSource;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct FlowTriggerExecutionCleanerImpl {
    trigger_instance_repository: Arc<dyn TriggerInstanceRepository>,
    time_source: Arc<dyn SystemTimeSource>,
    agent_config: Arc<FlowTriggerExecutionCleanerConfig>,
}

#[component(pub)]
#[interface(dyn FlowTriggerExecutionCleaner)]
#[interface(dyn BackgroundAgent)]
#[scope(Singleton)]
impl FlowTriggerExecutionCleanerImpl {
    pub fn new(
        trigger_instance_repository: Arc<dyn TriggerInstanceRepository>,
        time_source: Arc<dyn SystemTimeSource>,
        agent_config: Arc<FlowTriggerExecutionCleanerConfig>,
    ) -> Self {
        Self {
            trigger_instance_repository,
            time_source,
            agent_config,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl BackgroundAgent for FlowTriggerExecutionCleanerImpl {
    fn agent_name(&self) -> &'static str {
        "dev.kamu.domain.flow-trigger.FlowTriggerExecutionCleaner"
    }

    async fn run(&self) -> Result<(), InternalError> {
        loop {
            // A failed sweep is retried on the next tick
            if let Err(e) = self.clean_expired_executions().await {
                tracing::error!(
                    error = ?e,
                    error_msg = %e,
                    "Failed to clean expired flow trigger executions"
                );
            }

            self.time_source
                .sleep(self.agent_config.cleaning_interval)
                .await;
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl FlowTriggerExecutionCleaner for FlowTriggerExecutionCleanerImpl {
    #[tracing::instrument(level = "debug", skip_all)]
    async fn clean_expired_executions(&self) -> Result<usize, InternalError> {
        let older_than = self.time_source.now() - self.agent_config.retention_period;

        let deleted = self
            .trigger_instance_repository
            .delete_trigger_executions_finishing_older_than(older_than)
            .await?;

        tracing::info!(%older_than, deleted, "Cleaned expired flow trigger executions");

        Ok(deleted)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
