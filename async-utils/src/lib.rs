//! Async building blocks for event-loop driven pipelines.
//!
//! - [`OrCancelExt`] races a future against a `CancellationToken`, which is how
//!   superseded work is dropped without waiting for it to finish.
//! - [`Debounce`] is a trailing-edge debounce slot that the owning loop polls
//!   through [`Debounce::deadline`] and [`sleep_until_opt`].

mod debounce;

pub use debounce::Debounce;
pub use debounce::sleep_until_opt;

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Returned when the token fired before the future produced a value.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Extension trait for making futures cancellable.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Resolve to `Ok(output)` if the future wins, `Err(CancelErr::Cancelled)`
    /// if the token is (or already was) cancelled first.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}
