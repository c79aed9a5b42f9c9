// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};

use chrono::Duration;
use kamu_flow_trigger::{CancellationCause, TriggerInstanceID};
use time_source::SystemTimeSource;
use tokio::task::JoinSet;

use super::{TriggerCommand, TriggerCommandQueue};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Timers that turn into timeout cancellations. A fired timer only enqueues
/// a command: it never touches trigger state itself.
#[derive(Clone)]
pub(crate) struct TriggerTimeoutScheduler {
    time_source: Arc<dyn SystemTimeSource>,
    queue: TriggerCommandQueue,
    pending_timers: Arc<Mutex<JoinSet<()>>>,
}

impl TriggerTimeoutScheduler {
    pub(crate) fn new(time_source: Arc<dyn SystemTimeSource>, queue: TriggerCommandQueue) -> Self {
        Self {
            time_source,
            queue,
            pending_timers: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub(crate) fn schedule_timeout(&self, trigger_instance_id: TriggerInstanceID, delay: Duration) {
        // Deadline is fixed now, not when the timer task gets polled
        let deadline = self.time_source.now() + delay;

        tracing::debug!(%trigger_instance_id, %deadline, "Scheduling trigger instance timeout");

        let time_source = self.time_source.clone();
        let queue = self.queue.clone();

        let mut pending_timers = self.pending_timers.lock().unwrap();
        while pending_timers.try_join_next().is_some() {}

        pending_timers.spawn(async move {
            time_source.sleep(deadline - time_source.now()).await;

            tracing::info!(%trigger_instance_id, "Trigger instance reached its max wait time");

            queue.submit(TriggerCommand::Cancel {
                trigger_instance_id,
                cause: CancellationCause::Timeout,
            });
        });
    }

    /// Drops all timers that have not fired yet
    pub(crate) fn shutdown(&self) {
        let mut pending_timers = self.pending_timers.lock().unwrap();
        pending_timers.abort_all();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
