// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod email_sender;
mod flow_execution_submitter;
mod flow_trigger_definition_provider;
mod flow_trigger_service;
mod flow_trigger_service_config;

pub use email_sender::*;
pub use flow_execution_submitter::*;
pub use flow_trigger_definition_provider::*;
pub use flow_trigger_service::*;
pub use flow_trigger_service_config::*;
