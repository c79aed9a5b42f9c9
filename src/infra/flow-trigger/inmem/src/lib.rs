// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

// Re-exports
pub use kamu_flow_trigger as domain;

mod inmem_flow_trigger_definition_provider;
mod inmem_trigger_instance_repository;

pub use inmem_flow_trigger_definition_provider::*;
pub use inmem_trigger_instance_repository::*;
