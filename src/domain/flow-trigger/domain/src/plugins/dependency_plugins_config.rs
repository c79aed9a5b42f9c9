// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Settings of all dependency plugins, keyed by dependency type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPluginsConfig {
    #[serde(default)]
    pub plugins: BTreeMap<String, DependencyPluginSettings>,
}

impl DependencyPluginsConfig {
    pub fn new(plugins: BTreeMap<String, DependencyPluginSettings>) -> Self {
        Self { plugins }
    }

    /// Merged settings of one plugin, empty when none are declared
    pub fn plugin_config(
        &self,
        dependency_type: &str,
    ) -> Result<DependencyPluginConfig, DuplicatePluginPropertyError> {
        match self.plugins.get(dependency_type) {
            Some(settings) => settings.merge(dependency_type),
            None => Ok(DependencyPluginConfig::default()),
        }
    }
}

/// Settings of one plugin. Private properties hold secrets and are never
/// exposed outside of the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPluginSettings {
    #[serde(default)]
    pub public_props: BTreeMap<String, String>,
    #[serde(default)]
    pub private_props: BTreeMap<String, String>,
}

impl DependencyPluginSettings {
    fn merge(
        &self,
        dependency_type: &str,
    ) -> Result<DependencyPluginConfig, DuplicatePluginPropertyError> {
        let mut props = self.public_props.clone();

        for (key, value) in &self.private_props {
            if props.insert(key.clone(), value.clone()).is_some() {
                return Err(DuplicatePluginPropertyError {
                    dependency_type: dependency_type.to_string(),
                    key: key.clone(),
                });
            }
        }

        Ok(DependencyPluginConfig { props })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Flattened properties handed to a plugin at creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPluginConfig {
    props: BTreeMap<String, String>,
}

impl DependencyPluginConfig {
    pub fn new(props: BTreeMap<String, String>) -> Self {
        Self { props }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn get_required(&self, key: &str) -> Result<&str, MissingPluginPropertyError> {
        self.get(key).ok_or_else(|| MissingPluginPropertyError {
            key: key.to_string(),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Property '{key}' of dependency plugin '{dependency_type}' is both public and private")]
pub struct DuplicatePluginPropertyError {
    pub dependency_type: String,
    pub key: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Required plugin property '{key}' is missing")]
pub struct MissingPluginPropertyError {
    pub key: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
