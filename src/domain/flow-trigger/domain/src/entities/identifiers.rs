// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Uniquely identifies one attempt to satisfy the preconditions of a flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerInstanceID(Uuid);

impl TriggerInstanceID {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for TriggerInstanceID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Identifies a flow execution launched by the execution system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowExecutionID(i64);

impl FlowExecutionID {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl Display for FlowExecutionID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<FlowExecutionID> for i64 {
    fn from(value: FlowExecutionID) -> Self {
        value.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
