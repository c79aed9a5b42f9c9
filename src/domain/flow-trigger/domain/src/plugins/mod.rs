// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod dependency_check;
mod dependency_plugin_registry;
mod dependency_plugins_config;

pub use dependency_check::*;
pub use dependency_plugin_registry::*;
pub use dependency_plugins_config::*;
