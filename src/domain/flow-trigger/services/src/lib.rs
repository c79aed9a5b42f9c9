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

mod agents;
mod dependencies;
mod executor;
mod flow_trigger_service_impl;
mod plugins;
mod processors;

pub use agents::*;
pub use dependencies::*;
pub use flow_trigger_service_impl::*;
pub use plugins::*;
pub use processors::*;
