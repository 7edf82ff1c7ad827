use std::{future::Future, time::Duration};

use log::*;
use tokio::select;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
enum PollerState {
    NoTimer,
    TimerArmed {
        timer_id: u64,
        cancel: CancellationToken,
    },
}

/// Lifecycle of the single refresh timer of an observed signature.
/// At most one timer is armed at any time and it fires at most once, the
/// owner re-arms it after the fetch it triggered resolved.
#[derive(Debug)]
pub struct StatusPoller {
    state: PollerState,
    next_timer_id: u64,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPoller {
    pub fn new() -> Self {
        Self {
            state: PollerState::NoTimer,
            next_timer_id: 0,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, PollerState::TimerArmed { .. })
    }

    /// Arms a timer that runs the future created by `on_fire` once the
    /// `interval` elapsed, unless it is disarmed or the `parent` token is
    /// cancelled before that.
    /// The id of the timer is passed to `on_fire` and needs to be handed to
    /// [Self::fire] once the timer fires.
    ///
    /// Returns `false` without doing anything if a timer is armed already.
    pub fn arm<F, Fut>(
        &mut self,
        interval: Duration,
        parent: &CancellationToken,
        on_fire: F,
    ) -> bool
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_armed() {
            return false;
        }

        self.next_timer_id += 1;
        let timer_id = self.next_timer_id;
        let cancel = parent.child_token();
        self.state = PollerState::TimerArmed {
            timer_id,
            cancel: cancel.clone(),
        };

        trace!("Arming timer {timer_id} to fire in {interval:?}");
        tokio::spawn(async move {
            select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!("Timer {timer_id} cancelled");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
            on_fire(timer_id).await;
        });
        true
    }

    /// Marks the timer with the given id as fired.
    /// Returns `false` if that timer is no longer armed, in which case
    /// the caller must not act on it.
    pub fn fire(&mut self, timer_id: u64) -> bool {
        match &self.state {
            PollerState::TimerArmed {
                timer_id: armed_id,
                ..
            } if *armed_id == timer_id => {
                trace!("Timer {timer_id} fired");
                self.state = PollerState::NoTimer;
                true
            }
            _ => false,
        }
    }

    /// Cancels the armed timer if any.
    pub fn disarm(&mut self) {
        if let PollerState::TimerArmed { timer_id, cancel } =
            std::mem::replace(&mut self.state, PollerState::NoTimer)
        {
            trace!("Disarming timer {timer_id}");
            cancel.cancel();
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.disarm();
    }
}
