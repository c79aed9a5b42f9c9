// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dill::*;
use internal_error::InternalError;
use kamu_flow_trigger::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DefinitionKey {
    project_id: u64,
    project_version: u32,
    flow_id: String,
    flow_version: u32,
}

/// Definitions registered explicitly, per project version and flow version
pub struct InMemoryFlowTriggerDefinitionProvider {
    definitions: Mutex<HashMap<DefinitionKey, Arc<FlowTriggerDefinition>>>,
}

#[component(pub)]
#[interface(dyn FlowTriggerDefinitionProvider)]
#[scope(Singleton)]
impl InMemoryFlowTriggerDefinitionProvider {
    pub fn new() -> Self {
        Self {
            definitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_definition(
        &self,
        project: &FlowProject,
        flow_id: &str,
        flow_version: u32,
        definition: Arc<FlowTriggerDefinition>,
    ) {
        let mut definitions = self.definitions.lock().unwrap();
        definitions.insert(Self::key(project, flow_id, flow_version), definition);
    }

    pub fn remove_definition(&self, project: &FlowProject, flow_id: &str, flow_version: u32) {
        let mut definitions = self.definitions.lock().unwrap();
        definitions.remove(&Self::key(project, flow_id, flow_version));
    }

    fn key(project: &FlowProject, flow_id: &str, flow_version: u32) -> DefinitionKey {
        DefinitionKey {
            project_id: project.project_id,
            project_version: project.version,
            flow_id: flow_id.to_string(),
            flow_version,
        }
    }
}

#[async_trait::async_trait]
impl FlowTriggerDefinitionProvider for InMemoryFlowTriggerDefinitionProvider {
    async fn resolve_definition(
        &self,
        project: &FlowProject,
        flow_id: &str,
        flow_version: u32,
    ) -> Result<Option<Arc<FlowTriggerDefinition>>, InternalError> {
        let definitions = self.definitions.lock().unwrap();
        Ok(definitions
            .get(&Self::key(project, flow_id, flow_version))
            .cloned())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
