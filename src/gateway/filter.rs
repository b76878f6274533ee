//! Filter capability and the continuation handed to each filter.
//!
//! A filter either calls `next.run(ctx)` (pass-through), writes a response
//! into the context and returns without calling `next` (short-circuit), or
//! returns an error (failure). Everything after a short-circuit is skipped.

use std::sync::Arc;

use async_trait::async_trait;

use crate::gateway::{
    context::RequestContext, error::GatewayError, forwarder::DownstreamForwarder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request reached the downstream forwarder and its response was written.
    Forwarded,
    /// The named filter wrote the response itself.
    ShortCircuited(&'static str),
}

pub type FilterResult = Result<Outcome, GatewayError>;

#[async_trait]
pub trait GatewayFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs earlier.
    fn order(&self) -> i32;

    /// Filters that do not apply are skipped entirely for this request.
    fn applies_to(&self, _ctx: &RequestContext) -> bool {
        true
    }

    /// Runs instead of `filter` when `applies_to` is false.
    fn on_skip(&self, _ctx: &mut RequestContext) {}

    async fn filter(&self, ctx: &mut RequestContext, next: Next<'_>) -> FilterResult;
}

/// The remainder of the chain: the filters not yet run, then the forwarder.
pub struct Next<'a> {
    filters: &'a [Arc<dyn GatewayFilter>],
    forwarder: &'a dyn DownstreamForwarder,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        filters: &'a [Arc<dyn GatewayFilter>],
        forwarder: &'a dyn DownstreamForwarder,
    ) -> Self {
        Self { filters, forwarder }
    }

    pub async fn run(self, ctx: &mut RequestContext) -> FilterResult {
        let mut remaining = self.filters;

        while let Some((current, rest)) = remaining.split_first() {
            if current.applies_to(ctx) {
                let next = Next::new(rest, self.forwarder);
                return current.filter(ctx, next).await;
            }
            tracing::trace!(filter = current.name(), "filter skipped");
            current.on_skip(ctx);
            remaining = rest;
        }

        let response = self.forwarder.forward(ctx).await?;
        ctx.response_mut().write(response)?;
        Ok(Outcome::Forwarded)
    }
}
