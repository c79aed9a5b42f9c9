// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use internal_error::InternalError;
use thiserror::Error;

use crate::{
    DependencyCheck,
    DependencyPluginConfig,
    DependencyPluginNotFoundError,
    DuplicatePluginPropertyError,
    MissingPluginPropertyError,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Constructor of one kind of dependency plugin. Factories are registered
/// explicitly in the DI catalog, one per dependency type.
pub trait DependencyCheckFactory: Send + Sync {
    fn dependency_type(&self) -> &'static str;

    fn create(
        &self,
        config: &DependencyPluginConfig,
    ) -> Result<Arc<dyn DependencyCheck>, CreateDependencyCheckError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Resolves dependency types to loaded plugins
pub trait DependencyPluginRegistry: Send + Sync {
    /// Instantiates every registered plugin. Any failure aborts loading.
    fn load_all_plugins(&self) -> Result<(), LoadDependencyPluginsError>;

    fn get_dependency_check(
        &self,
        dependency_type: &str,
    ) -> Result<Arc<dyn DependencyCheck>, DependencyPluginNotFoundError>;

    fn loaded_dependency_types(&self) -> Vec<String>;

    /// Shuts down all loaded plugins and forgets them
    fn shutdown(&self);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum CreateDependencyCheckError {
    #[error(transparent)]
    MissingProperty(#[from] MissingPluginPropertyError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
pub enum LoadDependencyPluginsError {
    #[error("Dependency type '{dependency_type}' is registered more than once")]
    DuplicateDependencyType { dependency_type: String },

    #[error(transparent)]
    DuplicateProperty(#[from] DuplicatePluginPropertyError),

    #[error("Failed to create dependency plugin '{dependency_type}'")]
    CreateFailed {
        dependency_type: String,
        #[source]
        source: CreateDependencyCheckError,
    },

    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
