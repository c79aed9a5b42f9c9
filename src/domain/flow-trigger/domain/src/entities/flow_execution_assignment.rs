// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FlowExecutionID;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Link between a trigger instance and the flow execution it gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowExecutionAssignment {
    /// The flow was not launched yet
    #[default]
    Unassigned,
    Assigned(FlowExecutionID),
    /// Launch was attempted, but the execution system rejected it
    LaunchFailed,
}

impl FlowExecutionAssignment {
    pub fn is_unassigned(&self) -> bool {
        matches!(self, FlowExecutionAssignment::Unassigned)
    }

    pub fn flow_execution_id(&self) -> Option<FlowExecutionID> {
        match self {
            FlowExecutionAssignment::Assigned(id) => Some(*id),
            FlowExecutionAssignment::Unassigned | FlowExecutionAssignment::LaunchFailed => None,
        }
    }

    /// Leaves the unassigned state. Happens at most once per trigger instance.
    pub(crate) fn transition(
        &mut self,
        next: FlowExecutionAssignment,
    ) -> Result<(), FlowExecutionAlreadyAssignedError> {
        if !self.is_unassigned() {
            return Err(FlowExecutionAlreadyAssignedError { current: *self });
        }
        *self = next;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error("Flow execution is already assigned: {current:?}")]
pub struct FlowExecutionAlreadyAssignedError {
    pub current: FlowExecutionAssignment,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
