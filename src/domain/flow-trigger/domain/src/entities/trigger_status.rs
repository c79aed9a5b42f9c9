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

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Lifecycle state of a single dependency check, and (derived) of a whole
/// trigger instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Running,
    Succeeded,
    Cancelled,
    /// Cancellation was requested, but not yet confirmed. Never goes back to
    /// `Running`.
    Cancelling,
}

impl TriggerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TriggerStatus::Succeeded | TriggerStatus::Cancelled)
    }

    /// Computes the status of a trigger from the statuses of its
    /// dependencies. An empty set means there is nothing to wait for.
    pub fn derive_from(statuses: impl IntoIterator<Item = TriggerStatus>) -> TriggerStatus {
        let mut has_running = false;
        let mut has_succeeded = false;
        let mut has_cancelled = false;
        let mut has_cancelling = false;

        for status in statuses {
            match status {
                TriggerStatus::Running => has_running = true,
                TriggerStatus::Succeeded => has_succeeded = true,
                TriggerStatus::Cancelled => has_cancelled = true,
                TriggerStatus::Cancelling => has_cancelling = true,
            }
        }

        match (has_running, has_succeeded, has_cancelled, has_cancelling) {
            (true, _, false, false) => TriggerStatus::Running,
            (false, _, false, false) => TriggerStatus::Succeeded,
            (false, _, true, false) => TriggerStatus::Cancelled,
            _ => TriggerStatus::Cancelling,
        }
    }
}

impl Display for TriggerStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TriggerStatus::Running => write!(f, "RUNNING"),
            TriggerStatus::Succeeded => write!(f, "SUCCEEDED"),
            TriggerStatus::Cancelled => write!(f, "CANCELLED"),
            TriggerStatus::Cancelling => write!(f, "CANCELLING"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
