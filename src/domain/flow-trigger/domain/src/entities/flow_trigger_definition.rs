// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, HashSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Shortest accepted waiting period of a trigger
pub const MIN_FLOW_TRIGGER_MAX_WAIT: Duration = Duration::minutes(1);

/// Applied when the waiting period is not declared, and used as an upper cap
pub const DEFAULT_FLOW_TRIGGER_MAX_WAIT: Duration = Duration::days(10);

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// One precondition declared for a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTriggerDependency {
    pub name: String,
    pub dependency_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl FlowTriggerDependency {
    pub fn new(
        name: impl Into<String>,
        dependency_type: impl Into<String>,
        params: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            dependency_type: dependency_type.into(),
            params,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Validated trigger declaration of a flow: which dependencies to wait for,
/// and for how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTriggerDefinition {
    dependencies: Vec<FlowTriggerDependency>,
    max_wait: Duration,
}

impl FlowTriggerDefinition {
    pub fn try_new(
        dependencies: Vec<FlowTriggerDependency>,
        max_wait: Option<Duration>,
    ) -> Result<Self, InvalidFlowTriggerDefinitionError> {
        let mut names = HashSet::new();

        for (index, dependency) in dependencies.iter().enumerate() {
            if dependency.name.trim().is_empty() {
                return Err(InvalidFlowTriggerDefinitionError::MissingName { index });
            }
            if dependency.dependency_type.trim().is_empty() {
                return Err(InvalidFlowTriggerDefinitionError::MissingType {
                    name: dependency.name.clone(),
                });
            }
            if !names.insert(dependency.name.as_str()) {
                return Err(InvalidFlowTriggerDefinitionError::DuplicateName {
                    name: dependency.name.clone(),
                });
            }

            if let Some(other) = dependencies[..index].iter().find(|other| {
                other.dependency_type == dependency.dependency_type
                    && other.params == dependency.params
            }) {
                return Err(InvalidFlowTriggerDefinitionError::DuplicateDependency {
                    first: other.name.clone(),
                    second: dependency.name.clone(),
                });
            }
        }

        let max_wait = match max_wait {
            Some(max_wait) if max_wait < MIN_FLOW_TRIGGER_MAX_WAIT => {
                return Err(InvalidFlowTriggerDefinitionError::MaxWaitTooShort { max_wait });
            }
            Some(max_wait) => max_wait.min(DEFAULT_FLOW_TRIGGER_MAX_WAIT),
            None => DEFAULT_FLOW_TRIGGER_MAX_WAIT,
        };

        Ok(Self {
            dependencies,
            max_wait,
        })
    }

    pub fn dependencies(&self) -> &[FlowTriggerDependency] {
        &self.dependencies
    }

    pub fn dependency_by_name(&self, name: &str) -> Option<&FlowTriggerDependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidFlowTriggerDefinitionError {
    #[error("Dependency #{index} has no name")]
    MissingName { index: usize },

    #[error("Dependency '{name}' has no type")]
    MissingType { name: String },

    #[error("Dependency name '{name}' is declared more than once")]
    DuplicateName { name: String },

    #[error("Dependencies '{first}' and '{second}' have the same type and params")]
    DuplicateDependency { first: String, second: String },

    #[error("Max wait time {max_wait} is shorter than 1 minute")]
    MaxWaitTooShort { max_wait: Duration },
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
