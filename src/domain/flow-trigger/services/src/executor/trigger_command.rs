// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use internal_error::{InternalError, ResultIntoInternal};
use kamu_flow_trigger::*;
use tokio::sync::{mpsc, oneshot};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Units of work processed one by one by the trigger executor
#[derive(Debug)]
pub(crate) enum TriggerCommand {
    StartTrigger(StartFlowTriggerRequest),
    Cancel {
        trigger_instance_id: TriggerInstanceID,
        cause: CancellationCause,
    },
    MarkDependencySuccess(DependencyContextRef),
    MarkDependencyCancelled(DependencyContextRef),
    Recover(TriggerInstance),
    ListRunning(oneshot::Sender<Vec<TriggerInstance>>),
    FindRunning(TriggerInstanceID, oneshot::Sender<Option<TriggerInstance>>),
}

impl TriggerCommand {
    fn name(&self) -> &'static str {
        match self {
            TriggerCommand::StartTrigger(_) => "StartTrigger",
            TriggerCommand::Cancel { .. } => "Cancel",
            TriggerCommand::MarkDependencySuccess(_) => "MarkDependencySuccess",
            TriggerCommand::MarkDependencyCancelled(_) => "MarkDependencyCancelled",
            TriggerCommand::Recover(_) => "Recover",
            TriggerCommand::ListRunning(_) => "ListRunning",
            TriggerCommand::FindRunning(..) => "FindRunning",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Sending side of the executor queue. Cheap to clone, shared by the
/// service, the timeout scheduler and plugin callbacks.
#[derive(Clone)]
pub(crate) struct TriggerCommandQueue {
    commands_tx: mpsc::UnboundedSender<TriggerCommand>,
}

impl TriggerCommandQueue {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<TriggerCommand>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        (Self { commands_tx }, commands_rx)
    }

    /// Enqueues a command without waiting for it to be processed
    pub(crate) fn submit(&self, command: TriggerCommand) {
        if let Err(mpsc::error::SendError(command)) = self.commands_tx.send(command) {
            tracing::warn!(
                command = command.name(),
                "Flow trigger executor is stopped, command dropped"
            );
        }
    }

    /// Enqueues a query and waits for its answer. The answer comes after all
    /// commands enqueued earlier are processed.
    pub(crate) async fn request<T>(
        &self,
        make_command: impl FnOnce(oneshot::Sender<T>) -> TriggerCommand,
    ) -> Result<T, InternalError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        if self.commands_tx.send(make_command(reply_tx)).is_err() {
            return InternalError::bail("Flow trigger executor is stopped");
        }

        reply_rx.await.int_err()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Callback handed to plugins: forwards their notifications into the queue
pub(crate) struct FlowTriggerDependencyCallback {
    queue: TriggerCommandQueue,
}

impl FlowTriggerDependencyCallback {
    pub(crate) fn new(queue: TriggerCommandQueue) -> Self {
        Self { queue }
    }
}

impl DependencyInstanceCallback for FlowTriggerDependencyCallback {
    fn on_success(&self, context: Arc<dyn DependencyInstanceContext>) {
        self.queue
            .submit(TriggerCommand::MarkDependencySuccess(context.into()));
    }

    fn on_cancel(&self, context: Arc<dyn DependencyInstanceContext>) {
        self.queue
            .submit(TriggerCommand::MarkDependencyCancelled(context.into()));
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
