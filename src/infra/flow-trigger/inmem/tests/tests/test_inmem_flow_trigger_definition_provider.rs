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

use chrono::Duration;
use kamu_flow_trigger::{FlowProject, FlowTriggerDefinition, FlowTriggerDefinitionProvider};
use kamu_flow_trigger_inmem::InMemoryFlowTriggerDefinitionProvider;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_definitions_are_resolved_by_versions() {
    let provider = InMemoryFlowTriggerDefinitionProvider::new();

    let project_v1 = FlowProject {
        project_id: 1,
        name: "analytics".to_string(),
        version: 1,
        last_modified_by: "alice".to_string(),
        failure_emails: HashMap::new(),
    };
    let project_v2 = FlowProject {
        version: 2,
        ..project_v1.clone()
    };

    let definition =
        Arc::new(FlowTriggerDefinition::try_new(vec![], Some(Duration::hours(1))).unwrap());
    provider.add_definition(&project_v1, "daily-report", 1, definition.clone());

    assert_eq!(
        provider
            .resolve_definition(&project_v1, "daily-report", 1)
            .await
            .unwrap(),
        Some(definition)
    );
    assert_eq!(
        provider
            .resolve_definition(&project_v2, "daily-report", 1)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        provider
            .resolve_definition(&project_v1, "daily-report", 2)
            .await
            .unwrap(),
        None
    );

    provider.remove_definition(&project_v1, "daily-report", 1);
    assert_eq!(
        provider
            .resolve_definition(&project_v1, "daily-report", 1)
            .await
            .unwrap(),
        None
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
