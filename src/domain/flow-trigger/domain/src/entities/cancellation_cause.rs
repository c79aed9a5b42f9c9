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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationCause {
    /// Not cancelled
    None,
    /// Requested by a user or an external caller
    Manual,
    /// The trigger exceeded its maximum waiting time
    Timeout,
    /// The dependency check itself failed
    Failure,
    /// A sibling dependency failed
    Cascading,
}

impl CancellationCause {
    /// Picks the cause to propagate onto still running dependencies when a
    /// trigger with mixed causes is being cancelled. A failure of any sibling
    /// outranks everything and is propagated as [`CancellationCause::Cascading`].
    pub fn resolve(causes: impl IntoIterator<Item = CancellationCause>) -> CancellationCause {
        let mut resolved = CancellationCause::None;

        for cause in causes {
            match cause {
                CancellationCause::Failure | CancellationCause::Cascading => {
                    return CancellationCause::Cascading;
                }
                CancellationCause::Timeout => resolved = CancellationCause::Timeout,
                CancellationCause::Manual if resolved == CancellationCause::None => {
                    resolved = CancellationCause::Manual;
                }
                CancellationCause::Manual | CancellationCause::None => {}
            }
        }

        resolved
    }

    /// Causes the engine assigns when it asks a plugin to stop, as opposed to
    /// the plugin giving up on its own
    pub fn is_requested_by_engine(self) -> bool {
        matches!(
            self,
            CancellationCause::Manual | CancellationCause::Timeout | CancellationCause::Cascading
        )
    }
}

impl Display for CancellationCause {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CancellationCause::None => write!(f, "NONE"),
            CancellationCause::Manual => write!(f, "MANUAL"),
            CancellationCause::Timeout => write!(f, "TIMEOUT"),
            CancellationCause::Failure => write!(f, "FAILURE"),
            CancellationCause::Cascading => write!(f, "CASCADING"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
