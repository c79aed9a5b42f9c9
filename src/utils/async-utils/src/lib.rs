// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::InternalError;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A long-running loop owned by some service (cleaners, sweepers).
/// `run` returns only on an unrecoverable error; the owner stops the agent by
/// aborting the task it was spawned in.
#[async_trait::async_trait]
pub trait BackgroundAgent: Send + Sync {
    fn agent_name(&self) -> &'static str;

    async fn run(&self) -> Result<(), InternalError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
