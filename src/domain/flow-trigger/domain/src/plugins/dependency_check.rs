// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use internal_error::InternalError;
use thiserror::Error;

use crate::{FlowTriggerDependency, TriggerInstanceID};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Key under which the dependency name is passed to a plugin
pub const DEPENDENCY_CONFIG_NAME_KEY: &str = "name";

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A pluggable asynchronous evaluator of one kind of precondition.
///
/// `run` must not block: it starts the check and returns a context right
/// away. The plugin later reports the outcome through the callback, from any
/// thread, at most once per outcome.
pub trait DependencyCheck: Send + Sync {
    fn run(
        &self,
        config: DependencyInstanceConfig,
        runtime_props: DependencyInstanceRuntimeProps,
        callback: Arc<dyn DependencyInstanceCallback>,
    ) -> Result<Arc<dyn DependencyInstanceContext>, DependencyCheckRunError>;

    /// Releases plugin-wide resources. Running checks are not cancelled.
    fn shutdown(&self) {}
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Plugin-owned handle of one running check
pub trait DependencyInstanceContext: Send + Sync {
    /// Requests asynchronous cancellation. The plugin confirms it with
    /// [`DependencyInstanceCallback::on_cancel`]. Must tolerate repeated calls.
    fn cancel(self: Arc<Self>);
}

/// Engine side of the plugin conversation
pub trait DependencyInstanceCallback: Send + Sync {
    fn on_success(&self, context: Arc<dyn DependencyInstanceContext>);

    fn on_cancel(&self, context: Arc<dyn DependencyInstanceContext>);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Context handle compared by identity: the same allocation means the same
/// running check
#[derive(Clone)]
pub struct DependencyContextRef(Arc<dyn DependencyInstanceContext>);

impl DependencyContextRef {
    pub fn new(context: Arc<dyn DependencyInstanceContext>) -> Self {
        Self(context)
    }

    pub fn cancel(&self) {
        self.0.clone().cancel();
    }

    pub fn inner(&self) -> &Arc<dyn DependencyInstanceContext> {
        &self.0
    }
}

impl PartialEq for DependencyContextRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DependencyContextRef {}

impl fmt::Debug for DependencyContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DependencyContextRef")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

impl From<Arc<dyn DependencyInstanceContext>> for DependencyContextRef {
    fn from(value: Arc<dyn DependencyInstanceContext>) -> Self {
        Self::new(value)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Declared params of a dependency, plus its name under
/// [`DEPENDENCY_CONFIG_NAME_KEY`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInstanceConfig {
    props: BTreeMap<String, String>,
}

impl DependencyInstanceConfig {
    pub fn new(props: BTreeMap<String, String>) -> Self {
        Self { props }
    }

    pub fn from_dependency(dependency: &FlowTriggerDependency) -> Self {
        let mut props = dependency.params.clone();
        props.insert(
            DEPENDENCY_CONFIG_NAME_KEY.to_string(),
            dependency.name.clone(),
        );
        Self { props }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn dependency_name(&self) -> Option<&str> {
        self.get(DEPENDENCY_CONFIG_NAME_KEY)
    }

    pub fn props(&self) -> &BTreeMap<String, String> {
        &self.props
    }
}

/// Runtime facts a plugin may rely on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInstanceRuntimeProps {
    /// Start of the trigger instance. Kept across restarts, so a recovered
    /// check evaluates the same time window.
    pub start_time: DateTime<Utc>,
    pub trigger_instance_id: TriggerInstanceID,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum DependencyCheckRunError {
    #[error(transparent)]
    PluginNotFound(#[from] DependencyPluginNotFoundError),

    #[error("Invalid dependency config: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
#[error("No dependency plugin is registered for type '{dependency_type}'")]
pub struct DependencyPluginNotFoundError {
    pub dependency_type: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
