// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use internal_error::InternalError;

use crate::{FlowProject, FlowTriggerDefinition};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Resolves the trigger declaration of a flow from the project it belongs to
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait::async_trait]
pub trait FlowTriggerDefinitionProvider: Send + Sync {
    /// `None` when the project, the flow or its trigger no longer exists
    async fn resolve_definition(
        &self,
        project: &FlowProject,
        flow_id: &str,
        flow_version: u32,
    ) -> Result<Option<Arc<FlowTriggerDefinition>>, InternalError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
