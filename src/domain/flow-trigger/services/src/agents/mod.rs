// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod flow_trigger_execution_cleaner_impl;
mod flow_trigger_scheduler_impl;

pub use flow_trigger_execution_cleaner_impl::*;
pub use flow_trigger_scheduler_impl::*;
