// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::Duration;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
pub struct FlowTriggerServiceConfig {
    /// How many finished instances `get_recently_finished` returns
    pub recently_finished_limit: usize,
    /// Extra waiting time granted to recovered instances, so plugins have a
    /// chance to catch up after a restart
    pub recovery_grace_period: Duration,
    /// Name of this server as shown in notifications
    pub server_name: String,
}

impl FlowTriggerServiceConfig {
    pub fn new(
        recently_finished_limit: usize,
        recovery_grace_period: Duration,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            recently_finished_limit,
            recovery_grace_period,
            server_name: server_name.into(),
        }
    }

    pub fn test_default() -> Self {
        Self::new(10, Duration::minutes(1), "test-server")
    }
}

impl Default for FlowTriggerServiceConfig {
    fn default() -> Self {
        Self::new(50, Duration::minutes(1), "kamu")
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
