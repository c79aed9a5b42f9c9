// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::sync::Arc;

use kamu_flow_trigger::testing::{TestDependencyCheck, TestDependencyCheckFactory};
use kamu_flow_trigger::*;
use kamu_flow_trigger_services::DependencyPluginRegistryImpl;
use pretty_assertions::assert_eq;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Needs an `endpoint` property to be created
struct RemoteCheckFactory {
    dependency_check: Arc<TestDependencyCheck>,
}

impl DependencyCheckFactory for RemoteCheckFactory {
    fn dependency_type(&self) -> &'static str {
        "remote"
    }

    fn create(
        &self,
        config: &DependencyPluginConfig,
    ) -> Result<Arc<dyn DependencyCheck>, CreateDependencyCheckError> {
        config.get_required("endpoint")?;
        Ok(self.dependency_check.clone())
    }
}

fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn plugins_config(
    plugins: &[(&str, &[(&str, &str)], &[(&str, &str)])],
) -> Arc<DependencyPluginsConfig> {
    Arc::new(DependencyPluginsConfig::new(
        plugins
            .iter()
            .map(|(dependency_type, public_props, private_props)| {
                (
                    dependency_type.to_string(),
                    DependencyPluginSettings {
                        public_props: props(public_props),
                        private_props: props(private_props),
                    },
                )
            })
            .collect(),
    ))
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_load_all_plugins() {
    let local_check = Arc::new(TestDependencyCheck::new());
    let remote_check = Arc::new(TestDependencyCheck::new());
    let local_factory = Arc::new(TestDependencyCheckFactory::new("local", local_check.clone()));

    let registry = DependencyPluginRegistryImpl::new(
        vec![
            local_factory.clone(),
            Arc::new(RemoteCheckFactory {
                dependency_check: remote_check.clone(),
            }),
        ],
        plugins_config(&[
            ("local", &[("root", "/data")], &[("token", "secret")]),
            ("remote", &[("endpoint", "https://example.com")], &[]),
        ]),
    );

    assert!(registry.loaded_dependency_types().is_empty());

    registry.load_all_plugins().unwrap();

    assert_eq!(
        registry.loaded_dependency_types(),
        vec!["local".to_string(), "remote".to_string()]
    );
    assert_eq!(
        local_factory.created_with(),
        vec![DependencyPluginConfig::new(props(&[
            ("root", "/data"),
            ("token", "secret"),
        ]))]
    );

    assert!(registry.get_dependency_check("local").is_ok());
    assert!(registry.get_dependency_check("remote").is_ok());
    assert!(matches!(
        registry.get_dependency_check("unknown"),
        Err(DependencyPluginNotFoundError { dependency_type }) if dependency_type == "unknown"
    ));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_plugin_without_settings_gets_empty_config() {
    let factory = Arc::new(TestDependencyCheckFactory::new(
        "local",
        Arc::new(TestDependencyCheck::new()),
    ));

    let registry = DependencyPluginRegistryImpl::new(
        vec![factory.clone()],
        Arc::new(DependencyPluginsConfig::default()),
    );
    registry.load_all_plugins().unwrap();

    assert_eq!(factory.created_with(), vec![DependencyPluginConfig::default()]);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_duplicate_dependency_type_aborts_loading() {
    let first_check = Arc::new(TestDependencyCheck::new());

    let registry = DependencyPluginRegistryImpl::new(
        vec![
            Arc::new(TestDependencyCheckFactory::new("local", first_check.clone())),
            Arc::new(TestDependencyCheckFactory::new(
                "local",
                Arc::new(TestDependencyCheck::new()),
            )),
        ],
        Arc::new(DependencyPluginsConfig::default()),
    );

    assert!(matches!(
        registry.load_all_plugins(),
        Err(LoadDependencyPluginsError::DuplicateDependencyType { dependency_type })
            if dependency_type == "local"
    ));
    assert!(registry.loaded_dependency_types().is_empty());
    assert_eq!(first_check.shutdown_calls(), 1);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_duplicate_property_aborts_loading() {
    let registry = DependencyPluginRegistryImpl::new(
        vec![Arc::new(TestDependencyCheckFactory::new(
            "local",
            Arc::new(TestDependencyCheck::new()),
        ))],
        plugins_config(&[("local", &[("token", "a")], &[("token", "b")])]),
    );

    match registry.load_all_plugins() {
        Err(LoadDependencyPluginsError::DuplicateProperty(e)) => {
            assert_eq!(e.dependency_type, "local");
            assert_eq!(e.key, "token");
        }
        other => panic!("Unexpected result: {other:?}"),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_failed_plugin_creation_shuts_down_loaded_plugins() {
    let local_check = Arc::new(TestDependencyCheck::new());

    let registry = DependencyPluginRegistryImpl::new(
        vec![
            Arc::new(TestDependencyCheckFactory::new("local", local_check.clone())),
            Arc::new(RemoteCheckFactory {
                dependency_check: Arc::new(TestDependencyCheck::new()),
            }),
        ],
        Arc::new(DependencyPluginsConfig::default()),
    );

    match registry.load_all_plugins() {
        Err(LoadDependencyPluginsError::CreateFailed {
            dependency_type,
            source: CreateDependencyCheckError::MissingProperty(e),
        }) => {
            assert_eq!(dependency_type, "remote");
            assert_eq!(e.key, "endpoint");
        }
        other => panic!("Unexpected result: {other:?}"),
    }

    assert_eq!(local_check.shutdown_calls(), 1);
    assert!(registry.get_dependency_check("local").is_err());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_shutdown_unloads_plugins() {
    let local_check = Arc::new(TestDependencyCheck::new());

    let registry = DependencyPluginRegistryImpl::new(
        vec![Arc::new(TestDependencyCheckFactory::new("local", local_check.clone()))],
        Arc::new(DependencyPluginsConfig::default()),
    );
    registry.load_all_plugins().unwrap();

    registry.shutdown();
    registry.shutdown();

    assert_eq!(local_check.shutdown_calls(), 1);
    assert!(registry.loaded_dependency_types().is_empty());
    assert!(registry.get_dependency_check("local").is_err());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
