// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};

use dill::*;
use internal_error::{ErrorIntoInternal, InternalError};
use kamu_flow_trigger::*;
use time_source::SystemTimeSource;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::executor::{FlowTriggerExecutor, TriggerCommand, TriggerCommandQueue, TriggerTimeoutScheduler};
use crate::{DependencyInstanceProcessor, TriggerInstanceProcessor};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct FlowTriggerServiceImpl {
    queue: TriggerCommandQueue,
    timeout_scheduler: TriggerTimeoutScheduler,
    plugin_registry: Arc<dyn DependencyPluginRegistry>,
    trigger_instance_repository: Arc<dyn TriggerInstanceRepository>,
    definition_provider: Arc<dyn FlowTriggerDefinitionProvider>,
    cleaner: Arc<dyn FlowTriggerExecutionCleaner>,
    config: Arc<FlowTriggerServiceConfig>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    executor: Option<FlowTriggerExecutor>,
    executor_shutdown_tx: Option<oneshot::Sender<()>>,
    executor_task: Option<JoinHandle<()>>,
    cleaner_task: Option<JoinHandle<()>>,
    started: bool,
    shut_down: bool,
}

#[component(pub)]
#[interface(dyn FlowTriggerService)]
#[scope(Singleton)]
impl FlowTriggerServiceImpl {
    pub fn new(
        plugin_registry: Arc<dyn DependencyPluginRegistry>,
        trigger_instance_repository: Arc<dyn TriggerInstanceRepository>,
        definition_provider: Arc<dyn FlowTriggerDefinitionProvider>,
        trigger_processor: Arc<TriggerInstanceProcessor>,
        dependency_processor: Arc<DependencyInstanceProcessor>,
        cleaner: Arc<dyn FlowTriggerExecutionCleaner>,
        time_source: Arc<dyn SystemTimeSource>,
        config: Arc<FlowTriggerServiceConfig>,
    ) -> Self {
        let (queue, commands_rx) = TriggerCommandQueue::new();
        let (executor_shutdown_tx, executor_shutdown_rx) = oneshot::channel();
        let timeout_scheduler = TriggerTimeoutScheduler::new(time_source.clone(), queue.clone());

        let executor = FlowTriggerExecutor::new(
            commands_rx,
            executor_shutdown_rx,
            queue.clone(),
            plugin_registry.clone(),
            definition_provider.clone(),
            trigger_processor,
            dependency_processor,
            timeout_scheduler.clone(),
            time_source,
            config.recovery_grace_period,
        );

        Self {
            queue,
            timeout_scheduler,
            plugin_registry,
            trigger_instance_repository,
            definition_provider,
            cleaner,
            config,
            state: Mutex::new(State {
                executor: Some(executor),
                executor_shutdown_tx: Some(executor_shutdown_tx),
                ..State::default()
            }),
        }
    }

    fn ensure_running(&self) -> Result<(), InternalError> {
        let state = self.state.lock().unwrap();
        if state.shut_down {
            InternalError::bail("Flow trigger service is shut down")
        } else if !state.started {
            InternalError::bail("Flow trigger service is not started")
        } else {
            Ok(())
        }
    }

    async fn recover_incomplete_instances(&self) -> Result<(), InternalError> {
        let incomplete = self
            .trigger_instance_repository
            .get_incomplete_trigger_instances()
            .await?;

        tracing::info!(
            num_instances = incomplete.len(),
            "Recovering unfinished trigger instances"
        );

        for trigger_instance in incomplete {
            self.queue.submit(TriggerCommand::Recover(trigger_instance));
        }

        Ok(())
    }

    /// Store rows carry no definition, look them up for the caller
    async fn attach_definitions(
        &self,
        mut trigger_instances: Vec<TriggerInstance>,
    ) -> Vec<TriggerInstance> {
        for trigger_instance in &mut trigger_instances {
            self.attach_definition(trigger_instance).await;
        }
        trigger_instances
    }

    async fn attach_definition(&self, trigger_instance: &mut TriggerInstance) {
        match self
            .definition_provider
            .resolve_definition(
                trigger_instance.project(),
                trigger_instance.flow_id(),
                trigger_instance.flow_version(),
            )
            .await
        {
            Ok(Some(definition)) => trigger_instance.set_definition(definition),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    trigger_instance_id = %trigger_instance.id(),
                    error = ?e,
                    error_msg = %e,
                    "Failed to resolve trigger definition"
                );
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl FlowTriggerService for FlowTriggerServiceImpl {
    #[tracing::instrument(level = "info", skip_all)]
    async fn start(&self) -> Result<(), FlowTriggerServiceStartError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.shut_down {
                return Err(InternalError::new("Flow trigger service is shut down").into());
            }
            if state.started {
                return Err(FlowTriggerServiceStartError::AlreadyStarted);
            }
            state.started = true;
        }

        if let Err(e) = self.plugin_registry.load_all_plugins() {
            self.state.lock().unwrap().started = false;
            return Err(e.into());
        }

        if let Err(e) = self.recover_incomplete_instances().await {
            tracing::error!(error = ?e, error_msg = %e, "Failed to load unfinished trigger instances");
            self.plugin_registry.shutdown();
            self.state.lock().unwrap().started = false;
            return Err(e.into());
        }

        let mut state = self.state.lock().unwrap();
        let Some(executor) = state.executor.take() else {
            return Err(InternalError::new("Flow trigger executor is already consumed").into());
        };
        state.executor_task = Some(tokio::spawn(executor.run()));

        let cleaner = self.cleaner.clone();
        state.cleaner_task = Some(tokio::spawn(async move {
            if let Err(e) = cleaner.run().await {
                tracing::error!(
                    agent_name = cleaner.agent_name(),
                    error = ?e,
                    error_msg = %e,
                    "Background agent stopped"
                );
            }
        }));

        tracing::info!("Flow trigger service started");
        Ok(())
    }

    fn start_trigger(&self, request: StartFlowTriggerRequest) {
        self.queue.submit(TriggerCommand::StartTrigger(request));
    }

    fn cancel_trigger_instance(&self, trigger_instance_id: &TriggerInstanceID, cause: CancellationCause) {
        self.queue.submit(TriggerCommand::Cancel {
            trigger_instance_id: trigger_instance_id.clone(),
            cause,
        });
    }

    fn mark_dependency_success(&self, context: Arc<dyn DependencyInstanceContext>) {
        self.queue
            .submit(TriggerCommand::MarkDependencySuccess(context.into()));
    }

    fn mark_dependency_cancelled(&self, context: Arc<dyn DependencyInstanceContext>) {
        self.queue
            .submit(TriggerCommand::MarkDependencyCancelled(context.into()));
    }

    async fn get_running_triggers(&self) -> Result<Vec<TriggerInstance>, InternalError> {
        self.ensure_running()?;
        self.queue.request(TriggerCommand::ListRunning).await
    }

    async fn find_running_trigger_instance_by_id(
        &self,
        trigger_instance_id: &TriggerInstanceID,
    ) -> Result<Option<TriggerInstance>, InternalError> {
        self.ensure_running()?;

        let trigger_instance_id = trigger_instance_id.clone();
        self.queue
            .request(|reply_tx| TriggerCommand::FindRunning(trigger_instance_id, reply_tx))
            .await
    }

    async fn get_recently_finished(&self) -> Result<Vec<TriggerInstance>, InternalError> {
        let trigger_instances = self
            .trigger_instance_repository
            .get_recently_finished(self.config.recently_finished_limit)
            .await?;

        Ok(self.attach_definitions(trigger_instances).await)
    }

    async fn find_trigger_instance_by_id(
        &self,
        trigger_instance_id: &TriggerInstanceID,
    ) -> Result<Option<TriggerInstance>, InternalError> {
        let Some(mut trigger_instance) = self
            .trigger_instance_repository
            .get_trigger_instance_by_id(trigger_instance_id)
            .await?
        else {
            return Ok(None);
        };

        self.attach_definition(&mut trigger_instance).await;
        Ok(Some(trigger_instance))
    }

    async fn find_trigger_instance_by_flow_execution_id(
        &self,
        flow_execution_id: FlowExecutionID,
    ) -> Result<Option<TriggerInstance>, InternalError> {
        let Some(mut trigger_instance) = self
            .trigger_instance_repository
            .get_trigger_instance_by_flow_execution_id(flow_execution_id)
            .await?
        else {
            return Ok(None);
        };

        self.attach_definition(&mut trigger_instance).await;
        Ok(Some(trigger_instance))
    }

    async fn get_trigger_instances(
        &self,
        project_id: u64,
        flow_id: &str,
        pagination: PaginationOpts,
    ) -> Result<Vec<TriggerInstance>, InternalError> {
        let trigger_instances = self
            .trigger_instance_repository
            .get_trigger_instances(project_id, flow_id, pagination)
            .await?;

        Ok(self.attach_definitions(trigger_instances).await)
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn shutdown(&self) {
        let (executor, executor_shutdown_tx, executor_task, cleaner_task) = {
            let mut state = self.state.lock().unwrap();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            (
                state.executor.take(),
                state.executor_shutdown_tx.take(),
                state.executor_task.take(),
                state.cleaner_task.take(),
            )
        };

        // Executor that never started
        drop(executor);

        // The command in progress is completed, queued ones are dropped.
        // Once the executor exits, later commands are rejected.
        if let Some(executor_shutdown_tx) = executor_shutdown_tx {
            let _ = executor_shutdown_tx.send(());
        }
        if let Some(executor_task) = executor_task {
            if let Err(e) = executor_task.await {
                let e = e.int_err();
                tracing::error!(error = ?e, error_msg = %e, "Flow trigger executor failed");
            }
        }

        if let Some(cleaner_task) = cleaner_task {
            cleaner_task.abort();
        }

        self.timeout_scheduler.shutdown();
        self.plugin_registry.shutdown();

        tracing::info!("Flow trigger service shut down");
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
