// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Cron schedule on which new instances of a flow trigger are started.
///
/// Accepts quartz-style expressions with a leading seconds field (6 or 7
/// fields) and classic 5-field expressions, which fire at second zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTriggerSchedule {
    cron_expression: String,
    cron_schedule: cron::Schedule,
}

impl FlowTriggerSchedule {
    pub fn try_new(cron_expression: impl Into<String>) -> Result<Self, InvalidFlowTriggerScheduleError> {
        let cron_expression = cron_expression.into();

        let normalized = if cron_expression.split_whitespace().count() == 5 {
            format!("0 {cron_expression}")
        } else {
            cron_expression.clone()
        };

        let cron_schedule = cron::Schedule::from_str(&normalized).map_err(|e| {
            InvalidFlowTriggerScheduleError {
                cron_expression: cron_expression.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            cron_expression,
            cron_schedule,
        })
    }

    /// Expression as it was declared
    pub fn cron_expression(&self) -> &str {
        &self.cron_expression
    }

    /// First activation strictly after the given moment, `None` when the
    /// schedule never fires again
    pub fn next_activation_time(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron_schedule.after(&after).next()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error("Invalid cron expression '{cron_expression}': {reason}")]
pub struct InvalidFlowTriggerScheduleError {
    pub cron_expression: String,
    pub reason: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////


////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
