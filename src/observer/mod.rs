//! Invocation observers.
//!
//! [`TracingObserver`] writes the lifecycle of an adapter call through
//! `tracing`; [`NoopObserver`] discards it. Neither touches request payloads
//! beyond the event fields.

use std::backtrace::Backtrace;

use crate::core::error::InvokeError;
use crate::core::traits::{InvocationEvent, InvocationObserver};

pub const LOG_TARGET: &str = "insigma_adapters::invocation";

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl InvocationObserver for TracingObserver {
    fn on_start(&self, event: &InvocationEvent<'_>) {
        tracing::info!(
            target: LOG_TARGET,
            operation = event.operation,
            model = event.model,
            user = event.user_or_unknown(),
            detail = event.detail.as_deref().unwrap_or(""),
            "invocation started"
        );
        if let Some(endpoint) = event.endpoint {
            tracing::debug!(
                target: LOG_TARGET,
                operation = event.operation,
                endpoint,
                "using endpoint"
            );
        }
    }

    fn on_success(&self, event: &InvocationEvent<'_>) {
        tracing::info!(
            target: LOG_TARGET,
            operation = event.operation,
            model = event.model,
            detail = event.detail.as_deref().unwrap_or(""),
            "invocation succeeded"
        );
    }

    fn on_failure(&self, event: &InvocationEvent<'_>, error: &InvokeError) {
        // Stack of the reporting call site, not of the error's origin.
        // Captured only when RUST_BACKTRACE / RUST_LIB_BACKTRACE enable it.
        let report_backtrace = Backtrace::capture();
        tracing::error!(
            target: LOG_TARGET,
            operation = event.operation,
            model = event.model,
            user = event.user_or_unknown(),
            err = %error,
            err_kind = ?error.kind(),
            report_backtrace = %report_backtrace,
            "invocation failed"
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl InvocationObserver for NoopObserver {
    fn on_start(&self, _event: &InvocationEvent<'_>) {}

    fn on_success(&self, _event: &InvocationEvent<'_>) {}

    fn on_failure(&self, _event: &InvocationEvent<'_>, _error: &InvokeError) {}
}
