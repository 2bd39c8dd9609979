//! Value and gradient readiness for one batch
//!
//! Value readiness is broadcast-then-drain: one producer hands out one token
//! per registered consumer and each consumer takes exactly one. Gradient
//! readiness is accumulate-then-release: the producer waits until every
//! consumer has contributed, then clears the count for the next pass.

use super::monitor::Monitor;
use crate::error::{EnlaceError, Result};

#[derive(Debug, Default, Clone, Copy)]
struct GateState {
    count: usize,
    target: usize,
}

/// Count-based readiness signalling for a batch's value and gradient.
#[derive(Debug, Default)]
pub struct ReadinessGate {
    value: Monitor<GateState>,
    grad: Monitor<GateState>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate with `consumers` already registered and no readiness history.
    pub fn with_consumers(consumers: usize) -> Self {
        let state = GateState { count: 0, target: consumers };
        Self { value: Monitor::new(state), grad: Monitor::new(state) }
    }

    /// Same registered consumers, counters cleared.
    pub fn fork(&self) -> Self {
        Self::with_consumers(self.consumer_count())
    }

    /// Register one more downstream consumer. Call while building the graph.
    ///
    /// Both targets change under the value lock; lock order is value, then grad.
    pub fn register_consumer(&self) {
        let target = self.value.with(|value| {
            value.target += 1;
            self.grad.with(|grad| grad.target = value.target);
            value.target
        });
        tracing::trace!(consumers = target, "consumer registered");
    }

    pub fn consumer_count(&self) -> usize {
        self.value.with(|s| s.target)
    }

    /// Value tokens not yet taken in the current pass.
    pub fn value_tokens(&self) -> usize {
        self.value.with(|s| s.count)
    }

    /// Gradient contributions received in the current pass.
    pub fn grad_contributions(&self) -> usize {
        self.grad.with(|s| s.count)
    }

    /// Producer: payload is written. Hands one token to every consumer.
    pub fn signal_value_ready(&self) {
        self.value.notify_all(|s| {
            if s.count != 0 {
                tracing::warn!(
                    undrained = s.count,
                    consumers = s.target,
                    "value signalled again before previous tokens were consumed"
                );
            }
            s.count = s.target;
            tracing::trace!(count = s.count, target = s.target, "value ready");
        });
    }

    /// Consumer: block until a value token is available and take it.
    pub fn await_value(&self) -> Result<()> {
        self.value.wait_then(
            |s| s.target == 0 || s.count != 0,
            |s| {
                if s.target == 0 {
                    return Err(EnlaceError::logic("await_value on a batch with no registered consumers"));
                }
                s.count -= 1;
                tracing::trace!(count = s.count, target = s.target, "value token taken");
                Ok(())
            },
        )
    }

    /// Consumer: this consumer's gradient has been accumulated.
    pub fn signal_grad_contribution(&self) -> Result<()> {
        self.grad.notify_all(|s| {
            if s.count >= s.target {
                return Err(EnlaceError::logic(format!(
                    "gradient contribution {} exceeds {} registered consumers",
                    s.count + 1,
                    s.target
                )));
            }
            s.count += 1;
            tracing::trace!(count = s.count, target = s.target, "gradient contribution");
            Ok(())
        })
    }

    /// Producer: block until every consumer contributed, then reset for the next pass.
    pub fn await_grad_complete(&self) -> Result<()> {
        self.grad.wait_then(
            |s| s.target == 0 || s.count == s.target,
            |s| {
                if s.target == 0 {
                    return Err(EnlaceError::logic(
                        "await_grad_complete on a batch with no registered consumers",
                    ));
                }
                s.count = 0;
                tracing::trace!(target = s.target, "gradient complete");
                Ok(())
            },
        )
    }

    /// Clear both counters, keeping the registered consumers.
    pub fn reset(&self) {
        self.value.with(|s| s.count = 0);
        self.grad.with(|s| s.count = 0);
    }
}
