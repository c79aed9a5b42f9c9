// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dill::*;
use kamu_flow_trigger::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Side effects of trigger-level transitions: persistence, flow launch and
/// failure notifications
pub struct TriggerInstanceProcessor {
    repository: Arc<dyn TriggerInstanceRepository>,
    flow_execution_submitter: Arc<dyn FlowExecutionSubmitter>,
    email_sender: Arc<dyn EmailSender>,
    config: Arc<FlowTriggerServiceConfig>,
}

#[component(pub)]
#[scope(Singleton)]
impl TriggerInstanceProcessor {
    pub fn new(
        repository: Arc<dyn TriggerInstanceRepository>,
        flow_execution_submitter: Arc<dyn FlowExecutionSubmitter>,
        email_sender: Arc<dyn EmailSender>,
        config: Arc<FlowTriggerServiceConfig>,
    ) -> Self {
        Self {
            repository,
            flow_execution_submitter,
            email_sender,
            config,
        }
    }

    /// Persists a freshly created instance. Runs before any callback of its
    /// dependencies can be processed.
    pub async fn process_new_instance(&self, trigger_instance: &TriggerInstance) {
        if let Err(e) = self
            .repository
            .upload_trigger_instance(trigger_instance)
            .await
        {
            tracing::error!(
                trigger_instance_id = %trigger_instance.id(),
                error = ?e,
                error_msg = %e,
                "Failed to persist new trigger instance"
            );
        }
    }

    /// Launches the gated flow and records the resulting execution. A failed
    /// launch is recorded too, the instance stays succeeded.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(trigger_instance_id = %trigger_instance.id(), flow_id = trigger_instance.flow_id())
    )]
    pub async fn process_succeed(&self, trigger_instance: &mut TriggerInstance) {
        let request = FlowExecutionRequest {
            project: trigger_instance.project().clone(),
            flow_id: trigger_instance.flow_id().to_string(),
            flow_version: trigger_instance.flow_version(),
        };

        let assignment_res = match self
            .flow_execution_submitter
            .submit_executable_flow(request, trigger_instance.submit_user())
            .await
        {
            Ok(flow_execution_id) => {
                tracing::info!(%flow_execution_id, "Launched flow of succeeded trigger instance");
                trigger_instance.assign_flow_execution(flow_execution_id)
            }
            Err(e) => {
                tracing::error!(error = ?e, error_msg = %e, "Failed to launch flow");
                trigger_instance.mark_flow_launch_failed()
            }
        };

        if let Err(e) = assignment_res {
            tracing::error!(error = ?e, error_msg = %e, "Flow execution assignment rejected");
            return;
        }

        self.save_flow_execution(trigger_instance).await;
    }

    /// Gives up launching the flow of an instance that can't be resumed
    pub async fn process_abandoned_launch(&self, trigger_instance: &mut TriggerInstance) {
        if let Err(e) = trigger_instance.mark_flow_launch_failed() {
            tracing::error!(
                trigger_instance_id = %trigger_instance.id(),
                error = ?e,
                error_msg = %e,
                "Flow execution assignment rejected"
            );
            return;
        }

        self.save_flow_execution(trigger_instance).await;
    }

    /// Notifies the failure recipients of the flow, if any. Sending happens
    /// in background.
    pub fn process_termination(&self, trigger_instance: &TriggerInstance) {
        tracing::info!(
            trigger_instance_id = %trigger_instance.id(),
            cancellation_cause = %trigger_instance.resolved_cancellation_cause(),
            "Trigger instance cancelled"
        );

        let recipients = trigger_instance
            .project()
            .failure_emails_for(trigger_instance.flow_id())
            .to_vec();
        if recipients.is_empty() {
            return;
        }

        let subject = self.failure_email_subject(trigger_instance);
        let body = Self::failure_email_body(trigger_instance);
        let email_sender = self.email_sender.clone();
        let trigger_instance_id = trigger_instance.id().clone();

        tokio::spawn(async move {
            if let Err(e) = email_sender.send_email(&recipients, &subject, &body).await {
                tracing::error!(
                    %trigger_instance_id,
                    error = ?e,
                    error_msg = %e,
                    "Failed to send trigger cancellation email"
                );
            }
        });
    }

    async fn save_flow_execution(&self, trigger_instance: &TriggerInstance) {
        if let Err(e) = self
            .repository
            .update_associated_flow_execution(trigger_instance)
            .await
        {
            tracing::error!(
                trigger_instance_id = %trigger_instance.id(),
                error = ?e,
                error_msg = %e,
                "Failed to persist flow execution of trigger instance"
            );
        }
    }

    fn failure_email_subject(&self, trigger_instance: &TriggerInstance) -> String {
        format!(
            "Flow trigger for flow '{}.{}' has been cancelled on {}",
            trigger_instance.project().name,
            trigger_instance.flow_id(),
            self.config.server_name
        )
    }

    fn failure_email_body(trigger_instance: &TriggerInstance) -> String {
        fn format_time(t: Option<DateTime<Utc>>) -> String {
            t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string())
        }

        let mut body = format!(
            "Your flow trigger instance [id: {}] is cancelled.\n\n",
            trigger_instance.id()
        );

        writeln!(
            body,
            "{:<24} {:<24} {:<24} {:<12} CANCELLATION CAUSE",
            "NAME", "START TIME", "END TIME", "STATUS"
        )
        .unwrap();
        for dependency in trigger_instance.dependencies() {
            writeln!(
                body,
                "{:<24} {:<24} {:<24} {:<12} {}",
                dependency.dep_name(),
                format_time(Some(dependency.start_time())),
                format_time(dependency.end_time()),
                dependency.status().to_string(),
                dependency.cancellation_cause()
            )
            .unwrap();
        }

        body
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
