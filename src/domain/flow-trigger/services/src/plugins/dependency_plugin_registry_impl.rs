// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dill::*;
use kamu_flow_trigger::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct DependencyPluginRegistryImpl {
    factories: Vec<Arc<dyn DependencyCheckFactory>>,
    config: Arc<DependencyPluginsConfig>,
    loaded: RwLock<HashMap<String, Arc<dyn DependencyCheck>>>,
}

#[component(pub)]
#[interface(dyn DependencyPluginRegistry)]
#[scope(Singleton)]
impl DependencyPluginRegistryImpl {
    pub fn new(
        factories: Vec<Arc<dyn DependencyCheckFactory>>,
        config: Arc<DependencyPluginsConfig>,
    ) -> Self {
        Self {
            factories,
            config,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    fn create_all(&self) -> Result<HashMap<String, Arc<dyn DependencyCheck>>, LoadDependencyPluginsError> {
        let mut created: HashMap<String, Arc<dyn DependencyCheck>> = HashMap::new();

        let res = self.factories.iter().try_for_each(|factory| {
            let dependency_type = factory.dependency_type();
            if created.contains_key(dependency_type) {
                return Err(LoadDependencyPluginsError::DuplicateDependencyType {
                    dependency_type: dependency_type.to_string(),
                });
            }

            let plugin_config = self.config.plugin_config(dependency_type)?;
            let dependency_check = factory.create(&plugin_config).map_err(|e| {
                LoadDependencyPluginsError::CreateFailed {
                    dependency_type: dependency_type.to_string(),
                    source: e,
                }
            })?;

            tracing::info!(dependency_type, "Loaded dependency plugin");
            created.insert(dependency_type.to_string(), dependency_check);
            Ok(())
        });

        match res {
            Ok(()) => Ok(created),
            Err(e) => {
                for dependency_check in created.values() {
                    dependency_check.shutdown();
                }
                Err(e)
            }
        }
    }
}

impl DependencyPluginRegistry for DependencyPluginRegistryImpl {
    #[tracing::instrument(level = "info", skip_all)]
    fn load_all_plugins(&self) -> Result<(), LoadDependencyPluginsError> {
        let created = self.create_all().inspect_err(|e| {
            tracing::error!(error = ?e, error_msg = %e, "Failed to load dependency plugins");
        })?;

        let previous = std::mem::replace(&mut *self.loaded.write().unwrap(), created);
        for dependency_check in previous.values() {
            dependency_check.shutdown();
        }

        Ok(())
    }

    fn get_dependency_check(
        &self,
        dependency_type: &str,
    ) -> Result<Arc<dyn DependencyCheck>, DependencyPluginNotFoundError> {
        self.loaded
            .read()
            .unwrap()
            .get(dependency_type)
            .cloned()
            .ok_or_else(|| DependencyPluginNotFoundError {
                dependency_type: dependency_type.to_string(),
            })
    }

    fn loaded_dependency_types(&self) -> Vec<String> {
        let mut dependency_types: Vec<_> = self.loaded.read().unwrap().keys().cloned().collect();
        dependency_types.sort();
        dependency_types
    }

    fn shutdown(&self) {
        let loaded = std::mem::take(&mut *self.loaded.write().unwrap());

        for (dependency_type, dependency_check) in loaded {
            tracing::info!(%dependency_type, "Shutting down dependency plugin");
            dependency_check.shutdown();
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
