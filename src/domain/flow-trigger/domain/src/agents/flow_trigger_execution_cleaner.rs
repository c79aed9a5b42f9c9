// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_utils::BackgroundAgent;
use chrono::Duration;
use internal_error::InternalError;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Periodically removes old finished trigger executions from the store
#[async_trait::async_trait]
pub trait FlowTriggerExecutionCleaner: BackgroundAgent {
    /// Runs one sweep, returns the number of removed instances
    async fn clean_expired_executions(&self) -> Result<usize, InternalError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
pub struct FlowTriggerExecutionCleanerConfig {
    /// Finished executions older than this are removed
    pub retention_period: Duration,
    /// Pause between two sweeps
    pub cleaning_interval: Duration,
}

impl FlowTriggerExecutionCleanerConfig {
    pub fn new(retention_period: Duration, cleaning_interval: Duration) -> Self {
        Self {
            retention_period,
            cleaning_interval,
        }
    }

    pub fn test_default() -> Self {
        Self::new(Duration::days(1), Duration::hours(1))
    }
}

impl Default for FlowTriggerExecutionCleanerConfig {
    fn default() -> Self {
        Self::new(Duration::days(10), Duration::hours(1))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
