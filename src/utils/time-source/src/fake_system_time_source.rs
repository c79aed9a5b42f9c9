// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::oneshot;

use crate::SystemTimeSource;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
struct AwaitingCaller {
    wake_up_time: DateTime<Utc>,
    waker_tx: oneshot::Sender<()>,
}

impl Eq for AwaitingCaller {}

impl PartialEq<Self> for AwaitingCaller {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd<Self> for AwaitingCaller {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AwaitingCaller {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wake_up_time.cmp(&other.wake_up_time)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
struct FakeSystemTimeSourceState {
    t: DateTime<Utc>,
    awaiting_callers: BinaryHeap<Reverse<AwaitingCaller>>,
}

/// Manually driven clock for tests. Sleeping callers are woken only when the
/// time is moved past their wake-up point with [`Self::set`] or
/// [`Self::advance`].
#[derive(Debug, Clone)]
pub struct FakeSystemTimeSource {
    state: Arc<Mutex<FakeSystemTimeSourceState>>,
}

impl FakeSystemTimeSource {
    pub fn new() -> Self {
        Self::new_set(Utc::now())
    }

    pub fn new_set(t: DateTime<Utc>) -> Self {
        let state = FakeSystemTimeSourceState {
            t,
            awaiting_callers: BinaryHeap::new(),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set(&self, t: DateTime<Utc>) {
        let ready_callers = {
            let mut state = self.state.lock().unwrap();

            assert!(
                state.t <= t,
                "The previous time [{}] is more than new time [{t}]",
                state.t
            );

            state.t = t;

            let mut ready_callers = vec![];
            while let Some(awaiting_caller) = state.awaiting_callers.peek() {
                if awaiting_caller.0.wake_up_time > t {
                    break;
                }
                ready_callers.push(state.awaiting_callers.pop().unwrap());
            }
            ready_callers
        };

        for ready_caller in ready_callers {
            // The sleeping future might have been dropped (aborted task)
            let _ = ready_caller.0.waker_tx.send(());
        }
    }

    pub fn advance(&self, time_quantum: Duration) {
        let new_t = {
            let state = self.state.lock().unwrap();
            state.t + time_quantum
        };

        self.set(new_t);
    }

    /// Number of callers currently suspended in [`SystemTimeSource::sleep`]
    pub fn awaiting_callers_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .awaiting_callers
            .iter()
            .filter(|c| !c.0.waker_tx.is_closed())
            .count()
    }
}

#[async_trait::async_trait]
impl SystemTimeSource for FakeSystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        let state = self.state.lock().unwrap();
        state.t
    }

    async fn sleep(&self, duration: Duration) {
        if duration <= Duration::zero() {
            return;
        }

        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.state.lock().unwrap();

            let wake_up_time = state.t + duration;
            state.awaiting_callers.push(Reverse(AwaitingCaller {
                wake_up_time,
                waker_tx: tx,
            }));
        }

        // Sender is only dropped together with the whole time source
        let _ = rx.await;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
