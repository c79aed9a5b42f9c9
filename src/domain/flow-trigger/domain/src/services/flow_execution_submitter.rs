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
use thiserror::Error;

use crate::{FlowExecutionID, FlowProject};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Launches flows whose preconditions are satisfied
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait::async_trait]
pub trait FlowExecutionSubmitter: Send + Sync {
    async fn submit_executable_flow(
        &self,
        request: FlowExecutionRequest,
        submit_user: &str,
    ) -> Result<FlowExecutionID, SubmitFlowExecutionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowExecutionRequest {
    pub project: Arc<FlowProject>,
    pub flow_id: String,
    pub flow_version: u32,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum SubmitFlowExecutionError {
    #[error("Flow '{flow_id}' is not found in project '{project_name}'")]
    FlowNotFound {
        project_name: String,
        flow_id: String,
    },

    #[error("Flow execution rejected: {reason}")]
    Rejected { reason: String },

    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
