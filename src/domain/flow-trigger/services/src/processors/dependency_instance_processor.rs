// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use dill::*;
use kamu_flow_trigger::{DependencyInstance, TriggerInstanceRepository};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Side effects of dependency-level transitions
pub struct DependencyInstanceProcessor {
    repository: Arc<dyn TriggerInstanceRepository>,
}

#[component(pub)]
#[scope(Singleton)]
impl DependencyInstanceProcessor {
    pub fn new(repository: Arc<dyn TriggerInstanceRepository>) -> Self {
        Self { repository }
    }

    /// Persists status, cancellation cause and end time of the dependency
    pub async fn process_status_update(&self, dependency: &DependencyInstance) {
        tracing::debug!(
            trigger_instance_id = %dependency.trigger_instance_id(),
            dep_name = dependency.dep_name(),
            status = %dependency.status(),
            cancellation_cause = %dependency.cancellation_cause(),
            "Dependency status updated"
        );

        if let Err(e) = self
            .repository
            .update_dependency_execution_status(dependency)
            .await
        {
            tracing::error!(
                trigger_instance_id = %dependency.trigger_instance_id(),
                dep_name = dependency.dep_name(),
                error = ?e,
                error_msg = %e,
                "Failed to persist dependency status"
            );
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
