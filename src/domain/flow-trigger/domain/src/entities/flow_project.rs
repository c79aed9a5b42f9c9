// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;

use email_utils::Email;
use serde::{Deserialize, Serialize};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Snapshot of the project a triggered flow belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowProject {
    pub project_id: u64,
    pub name: String,
    pub version: u32,
    pub last_modified_by: String,
    /// Recipients notified when a trigger of the given flow is cancelled
    #[serde(default)]
    pub failure_emails: HashMap<String, Vec<Email>>,
}

impl FlowProject {
    pub fn failure_emails_for(&self, flow_id: &str) -> &[Email] {
        self.failure_emails
            .get(flow_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
