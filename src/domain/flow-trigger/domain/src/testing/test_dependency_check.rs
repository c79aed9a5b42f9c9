// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    CreateDependencyCheckError,
    DependencyCheck,
    DependencyCheckFactory,
    DependencyCheckRunError,
    DependencyInstanceCallback,
    DependencyInstanceConfig,
    DependencyInstanceContext,
    DependencyInstanceRuntimeProps,
    DependencyPluginConfig,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Dependency plugin driven by the test: every started check stays pending
/// until the test reports its outcome through the returned context
#[derive(Default)]
pub struct TestDependencyCheck {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    failing_names: HashSet<String>,
    auto_confirm_cancel: bool,
    contexts: Vec<Arc<TestDependencyContext>>,
    run_count: usize,
    shutdown_calls: usize,
}

impl TestDependencyCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `run` fail for the dependency with the given name
    pub fn fail_run_for(&self, dep_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_names.insert(dep_name.to_string());
    }

    /// When set, contexts created afterwards confirm cancellation requests
    /// immediately
    pub fn set_auto_confirm_cancel(&self, auto_confirm_cancel: bool) {
        self.state.lock().unwrap().auto_confirm_cancel = auto_confirm_cancel;
    }

    pub fn contexts(&self) -> Vec<Arc<TestDependencyContext>> {
        self.state.lock().unwrap().contexts.clone()
    }

    /// Most recently started check of the named dependency
    pub fn context_for(&self, dep_name: &str) -> Option<Arc<TestDependencyContext>> {
        let state = self.state.lock().unwrap();
        state
            .contexts
            .iter()
            .rev()
            .find(|c| c.config.dependency_name() == Some(dep_name))
            .cloned()
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().unwrap().run_count
    }

    pub fn shutdown_calls(&self) -> usize {
        self.state.lock().unwrap().shutdown_calls
    }
}

impl DependencyCheck for TestDependencyCheck {
    fn run(
        &self,
        config: DependencyInstanceConfig,
        runtime_props: DependencyInstanceRuntimeProps,
        callback: Arc<dyn DependencyInstanceCallback>,
    ) -> Result<Arc<dyn DependencyInstanceContext>, DependencyCheckRunError> {
        let mut state = self.state.lock().unwrap();
        state.run_count += 1;

        let dep_name = config.dependency_name().unwrap_or_default().to_string();
        if state.failing_names.contains(&dep_name) {
            return Err(DependencyCheckRunError::InvalidConfig {
                reason: format!("check of '{dep_name}' refused to start"),
            });
        }

        let context = Arc::new(TestDependencyContext {
            config,
            runtime_props,
            callback,
            auto_confirm_cancel: state.auto_confirm_cancel,
            cancel_requests: AtomicUsize::new(0),
        });
        state.contexts.push(context.clone());

        Ok(context)
    }

    fn shutdown(&self) {
        self.state.lock().unwrap().shutdown_calls += 1;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct TestDependencyContext {
    pub config: DependencyInstanceConfig,
    pub runtime_props: DependencyInstanceRuntimeProps,
    callback: Arc<dyn DependencyInstanceCallback>,
    auto_confirm_cancel: bool,
    cancel_requests: AtomicUsize,
}

impl TestDependencyContext {
    pub fn succeed(self: &Arc<Self>) {
        self.callback.on_success(self.clone());
    }

    /// Reports cancellation, either as a confirmation or on the plugin's own
    /// initiative
    pub fn report_cancelled(self: &Arc<Self>) {
        self.callback.on_cancel(self.clone());
    }

    pub fn cancel_requests(&self) -> usize {
        self.cancel_requests.load(Ordering::SeqCst)
    }
}

impl DependencyInstanceContext for TestDependencyContext {
    fn cancel(self: Arc<Self>) {
        self.cancel_requests.fetch_add(1, Ordering::SeqCst);

        if self.auto_confirm_cancel {
            self.callback.on_cancel(self.clone());
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct TestDependencyCheckFactory {
    dependency_type: &'static str,
    dependency_check: Arc<TestDependencyCheck>,
    created_with: Mutex<Vec<DependencyPluginConfig>>,
}

impl TestDependencyCheckFactory {
    pub fn new(dependency_type: &'static str, dependency_check: Arc<TestDependencyCheck>) -> Self {
        Self {
            dependency_type,
            dependency_check,
            created_with: Mutex::new(Vec::new()),
        }
    }

    /// Configs passed to every `create` call so far
    pub fn created_with(&self) -> Vec<DependencyPluginConfig> {
        self.created_with.lock().unwrap().clone()
    }
}

impl DependencyCheckFactory for TestDependencyCheckFactory {
    fn dependency_type(&self) -> &'static str {
        self.dependency_type
    }

    fn create(
        &self,
        config: &DependencyPluginConfig,
    ) -> Result<Arc<dyn DependencyCheck>, CreateDependencyCheckError> {
        self.created_with.lock().unwrap().push(config.clone());
        Ok(self.dependency_check.clone())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
