// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use chrono::Duration;
use kamu_flow_trigger::*;
use time_source::SystemTimeSource;
use tokio::sync::{mpsc, oneshot};

use super::{
    FlowTriggerDependencyCallback,
    TriggerCommand,
    TriggerCommandQueue,
    TriggerTimeoutScheduler,
};
use crate::{DependencyInstanceProcessor, TriggerInstanceProcessor};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Sole owner of the active trigger instances.
///
/// Commands are processed strictly one at a time, so no instance is ever
/// touched concurrently. Plugin callbacks, timeouts and service calls all
/// reach this state only through [`TriggerCommandQueue`].
pub(crate) struct FlowTriggerExecutor {
    commands_rx: mpsc::UnboundedReceiver<TriggerCommand>,
    shutdown_rx: oneshot::Receiver<()>,
    running_triggers: Vec<TriggerInstance>,
    callback: Arc<dyn DependencyInstanceCallback>,
    plugin_registry: Arc<dyn DependencyPluginRegistry>,
    definition_provider: Arc<dyn FlowTriggerDefinitionProvider>,
    trigger_processor: Arc<TriggerInstanceProcessor>,
    dependency_processor: Arc<DependencyInstanceProcessor>,
    timeout_scheduler: TriggerTimeoutScheduler,
    time_source: Arc<dyn SystemTimeSource>,
    recovery_grace_period: Duration,
}

impl FlowTriggerExecutor {
    pub(crate) fn new(
        commands_rx: mpsc::UnboundedReceiver<TriggerCommand>,
        shutdown_rx: oneshot::Receiver<()>,
        queue: TriggerCommandQueue,
        plugin_registry: Arc<dyn DependencyPluginRegistry>,
        definition_provider: Arc<dyn FlowTriggerDefinitionProvider>,
        trigger_processor: Arc<TriggerInstanceProcessor>,
        dependency_processor: Arc<DependencyInstanceProcessor>,
        timeout_scheduler: TriggerTimeoutScheduler,
        time_source: Arc<dyn SystemTimeSource>,
        recovery_grace_period: Duration,
    ) -> Self {
        Self {
            commands_rx,
            shutdown_rx,
            running_triggers: Vec::new(),
            callback: Arc::new(FlowTriggerDependencyCallback::new(queue)),
            plugin_registry,
            definition_provider,
            trigger_processor,
            dependency_processor,
            timeout_scheduler,
            time_source,
            recovery_grace_period,
        }
    }

    /// Processes commands until the shutdown signal arrives. The signal is
    /// only observed between commands, so a started command always completes.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    tracing::debug!(
                        num_running = self.running_triggers.len(),
                        "Flow trigger executor is shutting down"
                    );
                    break;
                }

                maybe_command = self.commands_rx.recv() => {
                    let Some(command) = maybe_command else {
                        tracing::debug!("Flow trigger command queue is closed");
                        break;
                    };
                    self.handle_command(command).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: TriggerCommand) {
        match command {
            TriggerCommand::StartTrigger(request) => self.start_trigger(request).await,
            TriggerCommand::Cancel {
                trigger_instance_id,
                cause,
            } => self.cancel(&trigger_instance_id, cause).await,
            TriggerCommand::MarkDependencySuccess(context) => {
                self.mark_dependency_success(&context).await;
            }
            TriggerCommand::MarkDependencyCancelled(context) => {
                self.mark_dependency_cancelled(&context).await;
            }
            TriggerCommand::Recover(trigger_instance) => self.recover(trigger_instance).await,
            TriggerCommand::ListRunning(reply_tx) => {
                let _ = reply_tx.send(self.running_triggers.clone());
            }
            TriggerCommand::FindRunning(trigger_instance_id, reply_tx) => {
                let found = self
                    .running_triggers
                    .iter()
                    .find(|t| *t.id() == trigger_instance_id)
                    .cloned();
                let _ = reply_tx.send(found);
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(project = %request.project.name, flow_id = %request.flow_id)
    )]
    async fn start_trigger(&mut self, request: StartFlowTriggerRequest) {
        let trigger_instance_id = TriggerInstanceID::new_random();
        let start_time = self.time_source.now();

        let dependencies = request
            .definition
            .dependencies()
            .iter()
            .map(|dependency| {
                match self.run_dependency_check(dependency, &trigger_instance_id, start_time) {
                    Ok(context) => DependencyInstance::new_running(
                        trigger_instance_id.clone(),
                        &dependency.name,
                        start_time,
                        context,
                    ),
                    Err(e) => {
                        tracing::error!(
                            %trigger_instance_id,
                            dep_name = %dependency.name,
                            error = ?e,
                            error_msg = %e,
                            "Failed to start dependency check"
                        );
                        DependencyInstance::new_failed(
                            trigger_instance_id.clone(),
                            &dependency.name,
                            start_time,
                            self.time_source.now(),
                        )
                    }
                }
            })
            .collect();

        let max_wait = request.definition.max_wait();
        let mut trigger_instance = TriggerInstance::new(
            trigger_instance_id.clone(),
            request.flow_id,
            request.flow_version,
            request.submit_user,
            request.project,
            start_time,
            dependencies,
            Some(request.definition),
        );

        tracing::info!(
            %trigger_instance_id,
            status = %trigger_instance.status(),
            "Starting trigger instance"
        );

        self.trigger_processor
            .process_new_instance(&trigger_instance)
            .await;

        match trigger_instance.status() {
            TriggerStatus::Running => {
                self.timeout_scheduler
                    .schedule_timeout(trigger_instance_id, max_wait);
                self.running_triggers.push(trigger_instance);
            }
            TriggerStatus::Cancelling => {
                self.running_triggers.push(trigger_instance);
                self.cancel_trigger_instance(self.running_triggers.len() - 1)
                    .await;
            }
            TriggerStatus::Succeeded => {
                self.trigger_processor
                    .process_succeed(&mut trigger_instance)
                    .await;
            }
            TriggerStatus::Cancelled => {
                self.trigger_processor
                    .process_termination(&trigger_instance);
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    #[tracing::instrument(level = "debug", skip_all, fields(%trigger_instance_id, %cause))]
    async fn cancel(&mut self, trigger_instance_id: &TriggerInstanceID, cause: CancellationCause) {
        let Some(index) = self.find_running_trigger(trigger_instance_id) else {
            tracing::debug!("Trigger instance is not active, cancellation ignored");
            return;
        };

        let now = self.time_source.now();
        let trigger_instance = &mut self.running_triggers[index];

        let status = trigger_instance.status();
        if status != TriggerStatus::Running {
            tracing::info!(%status, "Trigger instance is not running, cancellation ignored");
            return;
        }

        tracing::info!("Cancelling trigger instance");

        for dependency in trigger_instance.dependencies_mut() {
            if dependency.status() != TriggerStatus::Running {
                continue;
            }
            if !Self::update_dependency(dependency, TriggerStatus::Cancelling, cause, now) {
                continue;
            }
            self.dependency_processor
                .process_status_update(dependency)
                .await;
            Self::request_context_cancellation(dependency);
        }
    }

    /// Propagates the resolved cause onto running dependencies and asks
    /// every unfinished dependency to stop
    async fn cancel_trigger_instance(&mut self, index: usize) {
        let now = self.time_source.now();
        let trigger_instance = &mut self.running_triggers[index];
        let cause = trigger_instance.resolved_cancellation_cause();

        tracing::info!(
            trigger_instance_id = %trigger_instance.id(),
            %cause,
            "Cascading cancellation of trigger instance"
        );

        for dependency in trigger_instance.dependencies_mut() {
            match dependency.status() {
                TriggerStatus::Running => {
                    if !Self::update_dependency(dependency, TriggerStatus::Cancelling, cause, now) {
                        continue;
                    }
                    self.dependency_processor
                        .process_status_update(dependency)
                        .await;
                    Self::request_context_cancellation(dependency);
                }
                // Plugins tolerate repeated requests
                TriggerStatus::Cancelling => Self::request_context_cancellation(dependency),
                TriggerStatus::Succeeded | TriggerStatus::Cancelled => {}
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    async fn mark_dependency_success(&mut self, context: &DependencyContextRef) {
        let Some((index, dep_index)) = self.find_dependency(context) else {
            tracing::info!(
                ?context,
                "Success reported for unknown dependency, trigger instance is no longer active"
            );
            return;
        };

        let now = self.time_source.now();
        let dependency = &mut self.running_triggers[index].dependencies_mut()[dep_index];

        if dependency.is_terminal() {
            tracing::warn!(
                trigger_instance_id = %dependency.trigger_instance_id(),
                dep_name = dependency.dep_name(),
                status = %dependency.status(),
                "Success reported for finished dependency, ignored"
            );
            return;
        }

        tracing::info!(
            trigger_instance_id = %dependency.trigger_instance_id(),
            dep_name = dependency.dep_name(),
            "Dependency succeeded"
        );

        if !Self::update_dependency(
            dependency,
            TriggerStatus::Succeeded,
            CancellationCause::None,
            now,
        ) {
            return;
        }
        self.dependency_processor
            .process_status_update(dependency)
            .await;

        self.finish_if_terminal(index).await;
    }

    async fn mark_dependency_cancelled(&mut self, context: &DependencyContextRef) {
        let Some((index, dep_index)) = self.find_dependency(context) else {
            tracing::info!(
                ?context,
                "Cancellation reported for unknown dependency, trigger instance is no longer active"
            );
            return;
        };

        let now = self.time_source.now();
        let dependency = &mut self.running_triggers[index].dependencies_mut()[dep_index];

        if dependency.is_terminal() {
            tracing::warn!(
                trigger_instance_id = %dependency.trigger_instance_id(),
                dep_name = dependency.dep_name(),
                status = %dependency.status(),
                "Cancellation reported for finished dependency, ignored"
            );
            return;
        }

        if dependency.is_cancellation_requested_by_engine() {
            tracing::info!(
                trigger_instance_id = %dependency.trigger_instance_id(),
                dep_name = dependency.dep_name(),
                cause = %dependency.cancellation_cause(),
                "Dependency confirmed cancellation"
            );

            let cause = dependency.cancellation_cause();
            if !Self::update_dependency(dependency, TriggerStatus::Cancelled, cause, now) {
                return;
            }
            self.dependency_processor
                .process_status_update(dependency)
                .await;
        } else {
            // The plugin gave up on its own: a failure that takes down the
            // sibling dependencies too
            tracing::warn!(
                trigger_instance_id = %dependency.trigger_instance_id(),
                dep_name = dependency.dep_name(),
                "Dependency cancelled by its plugin"
            );

            if !Self::update_dependency(
                dependency,
                TriggerStatus::Cancelled,
                CancellationCause::Failure,
                now,
            ) {
                return;
            }
            self.dependency_processor
                .process_status_update(dependency)
                .await;

            self.cancel_trigger_instance(index).await;
        }

        self.finish_if_terminal(index).await;
    }

    /// Removes the instance from the active set once it is finished and runs
    /// the matching side effects
    async fn finish_if_terminal(&mut self, index: usize) {
        match self.running_triggers[index].status() {
            TriggerStatus::Succeeded => {
                let mut trigger_instance = self.running_triggers.remove(index);
                tracing::info!(
                    trigger_instance_id = %trigger_instance.id(),
                    "Trigger instance succeeded"
                );
                self.trigger_processor
                    .process_succeed(&mut trigger_instance)
                    .await;
            }
            TriggerStatus::Cancelled => {
                let trigger_instance = self.running_triggers.remove(index);
                self.trigger_processor
                    .process_termination(&trigger_instance);
            }
            TriggerStatus::Running | TriggerStatus::Cancelling => {}
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(trigger_instance_id = %trigger_instance.id())
    )]
    async fn recover(&mut self, mut trigger_instance: TriggerInstance) {
        let definition = match self
            .definition_provider
            .resolve_definition(
                trigger_instance.project(),
                trigger_instance.flow_id(),
                trigger_instance.flow_version(),
            )
            .await
        {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                tracing::error!(
                    project = %trigger_instance.project().name,
                    flow_id = trigger_instance.flow_id(),
                    flow_version = trigger_instance.flow_version(),
                    "Trigger definition no longer exists, abandoning trigger instance"
                );
                self.abandon(trigger_instance).await;
                return;
            }
            Err(e) => {
                tracing::error!(
                    error = ?e,
                    error_msg = %e,
                    "Failed to resolve trigger definition, skipping trigger instance"
                );
                return;
            }
        };
        trigger_instance.set_definition(definition.clone());

        if trigger_instance.is_awaiting_launch() {
            tracing::info!("Recovered trigger instance succeeded before restart, launching its flow");
            self.trigger_processor
                .process_succeed(&mut trigger_instance)
                .await;
            return;
        }

        let now = self.time_source.now();
        let trigger_instance_id = trigger_instance.id().clone();

        for dependency in trigger_instance.dependencies_mut() {
            if dependency.is_terminal() {
                continue;
            }

            let context_res = match definition.dependency_by_name(dependency.dep_name()) {
                Some(declared) => {
                    self.run_dependency_check(declared, &trigger_instance_id, dependency.start_time())
                }
                None => Err(DependencyCheckRunError::InvalidConfig {
                    reason: format!(
                        "dependency '{}' is no longer declared",
                        dependency.dep_name()
                    ),
                }),
            };

            match context_res {
                Ok(context) => {
                    if let Err(e) = dependency.set_context(context) {
                        tracing::error!(error = ?e, error_msg = %e, "Failed to attach context");
                    }
                }
                Err(e) => {
                    tracing::error!(
                        dep_name = dependency.dep_name(),
                        error = ?e,
                        error_msg = %e,
                        "Failed to restart dependency check"
                    );
                    if Self::update_dependency(
                        dependency,
                        TriggerStatus::Cancelled,
                        CancellationCause::Failure,
                        now,
                    ) {
                        self.dependency_processor
                            .process_status_update(dependency)
                            .await;
                    }
                }
            }
        }

        let status = trigger_instance.status();
        tracing::info!(%status, "Recovered trigger instance");

        match status {
            TriggerStatus::Running => {
                let elapsed = now - trigger_instance.start_time();
                let remaining = (definition.max_wait() - elapsed).max(Duration::zero())
                    + self.recovery_grace_period;

                self.timeout_scheduler
                    .schedule_timeout(trigger_instance_id, remaining);
                self.running_triggers.push(trigger_instance);
            }
            TriggerStatus::Cancelling => {
                self.running_triggers.push(trigger_instance);
                self.cancel_trigger_instance(self.running_triggers.len() - 1)
                    .await;
            }
            TriggerStatus::Cancelled => {
                self.trigger_processor
                    .process_termination(&trigger_instance);
            }
            TriggerStatus::Succeeded => {
                if trigger_instance.is_awaiting_launch() {
                    self.trigger_processor
                        .process_succeed(&mut trigger_instance)
                        .await;
                }
            }
        }
    }

    /// Finalizes an instance that can't be resumed, so it is not loaded again
    /// on the next start
    async fn abandon(&mut self, mut trigger_instance: TriggerInstance) {
        if trigger_instance.is_awaiting_launch() {
            self.trigger_processor
                .process_abandoned_launch(&mut trigger_instance)
                .await;
            return;
        }

        let now = self.time_source.now();
        for dependency in trigger_instance.dependencies_mut() {
            if dependency.is_terminal() {
                continue;
            }
            if Self::update_dependency(
                dependency,
                TriggerStatus::Cancelled,
                CancellationCause::Failure,
                now,
            ) {
                self.dependency_processor
                    .process_status_update(dependency)
                    .await;
            }
        }

        self.trigger_processor
            .process_termination(&trigger_instance);
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    fn run_dependency_check(
        &self,
        dependency: &FlowTriggerDependency,
        trigger_instance_id: &TriggerInstanceID,
        start_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<DependencyContextRef, DependencyCheckRunError> {
        let dependency_check = self
            .plugin_registry
            .get_dependency_check(&dependency.dependency_type)?;

        let context = dependency_check.run(
            DependencyInstanceConfig::from_dependency(dependency),
            DependencyInstanceRuntimeProps {
                start_time,
                trigger_instance_id: trigger_instance_id.clone(),
            },
            self.callback.clone(),
        )?;

        Ok(DependencyContextRef::new(context))
    }

    fn find_running_trigger(&self, trigger_instance_id: &TriggerInstanceID) -> Option<usize> {
        self.running_triggers
            .iter()
            .position(|t| t.id() == trigger_instance_id)
    }

    fn find_dependency(&self, context: &DependencyContextRef) -> Option<(usize, usize)> {
        self.running_triggers
            .iter()
            .enumerate()
            .find_map(|(index, t)| {
                t.find_dependency_by_context(context)
                    .map(|dep_index| (index, dep_index))
            })
    }

    fn update_dependency(
        dependency: &mut DependencyInstance,
        status: TriggerStatus,
        cause: CancellationCause,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        match dependency.update_status_and_cause(status, cause, now) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = ?e, error_msg = %e, "Dependency update rejected");
                false
            }
        }
    }

    /// Fire-and-forget: plugins may block inside `cancel`
    fn request_context_cancellation(dependency: &DependencyInstance) {
        let Some(context) = dependency.context().cloned() else {
            tracing::warn!(
                trigger_instance_id = %dependency.trigger_instance_id(),
                dep_name = dependency.dep_name(),
                "Dependency has no context to cancel"
            );
            return;
        };

        tokio::task::spawn_blocking(move || context.cancel());
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
