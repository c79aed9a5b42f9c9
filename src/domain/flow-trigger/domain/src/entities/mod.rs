// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod cancellation_cause;
mod dependency_instance;
mod flow_execution_assignment;
mod flow_project;
mod flow_trigger_definition;
mod flow_trigger_schedule;
mod identifiers;
mod trigger_instance;
mod trigger_status;

pub use cancellation_cause::*;
pub use dependency_instance::*;
pub use flow_execution_assignment::*;
pub use flow_project::*;
pub use flow_trigger_definition::*;
pub use flow_trigger_schedule::*;
pub use identifiers::*;
pub use trigger_instance::*;
pub use trigger_status::*;
