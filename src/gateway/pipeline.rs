//! The ordered filter chain wrapped around every proxied request.
//!
//! `handle` never fails: any error raised by a filter or the forwarder is
//! caught here once, classified, rendered, and becomes the final response.

use std::sync::Arc;

use crate::gateway::{
    access_log::AccessLogFilter,
    classifier::{ErrorClassifier, ErrorKind, ErrorRenderer},
    context::{GatewayResponse, RequestContext},
    error::GatewayError,
    fallback::FallbackRouter,
    filter::{GatewayFilter, Next, Outcome},
    forwarder::DownstreamForwarder,
    sink::{FailureRecord, GatewayLog},
};

pub struct Pipeline {
    access_log: Option<AccessLogFilter>,
    filters: Vec<Arc<dyn GatewayFilter>>,
    forwarder: Arc<dyn DownstreamForwarder>,
    classifier: ErrorClassifier,
    renderer: Arc<dyn ErrorRenderer>,
    fallback: Option<FallbackRouter>,
    log: Arc<dyn GatewayLog>,
}

impl Pipeline {
    pub fn builder(
        forwarder: Arc<dyn DownstreamForwarder>,
        renderer: Arc<dyn ErrorRenderer>,
        log: Arc<dyn GatewayLog>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            access_log: None,
            filters: Vec::new(),
            forwarder,
            renderer,
            fallback: None,
            log,
        }
    }

    /// Filter names in execution order.
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub async fn handle(&self, mut ctx: RequestContext) -> GatewayResponse {
        let guard = self
            .access_log
            .as_ref()
            .map(|access_log| access_log.on_enter(&mut ctx));

        let result = Next::new(&self.filters, self.forwarder.as_ref())
            .run(&mut ctx)
            .await;

        let failure = match result {
            Ok(outcome) if ctx.response().is_written() => {
                tracing::trace!(?outcome, "pipeline completed");
                None
            }
            Ok(Outcome::ShortCircuited(filter)) => {
                tracing::error!(filter, "filter short-circuited without writing a response");
                Some(GatewayError::NoResponse)
            }
            Ok(Outcome::Forwarded) => Some(GatewayError::NoResponse),
            Err(failure) => Some(failure),
        };

        if let Some(failure) = &failure {
            self.recover(&mut ctx, failure);
        }

        if let Some(guard) = guard {
            guard.complete(&ctx, failure.as_ref());
        }

        match ctx.into_response() {
            Some(response) => response,
            // recover() always writes
            None => self
                .renderer
                .render(&ErrorKind::Generic.into(), "/"),
        }
    }

    fn recover(&self, ctx: &mut RequestContext, failure: &GatewayError) {
        let classification = self.classifier.classify(failure);

        self.log.failure(&FailureRecord {
            method: ctx.method.clone(),
            uri: ctx.uri.to_string(),
            kind: classification.kind,
            status: classification.status.as_u16(),
            detail: failure.to_string(),
        });

        let fallback = match (&self.fallback, classification.kind) {
            (Some(router), ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamTimeout) => self
                .forwarder
                .service_for(ctx.path())
                .map(|service| router.fallback_for(&service)),
            _ => None,
        };

        let response =
            fallback.unwrap_or_else(|| self.renderer.render(&classification, ctx.path()));
        ctx.response_mut().replace(response);
    }
}

pub struct PipelineBuilder {
    access_log: Option<AccessLogFilter>,
    filters: Vec<Arc<dyn GatewayFilter>>,
    forwarder: Arc<dyn DownstreamForwarder>,
    renderer: Arc<dyn ErrorRenderer>,
    fallback: Option<FallbackRouter>,
    log: Arc<dyn GatewayLog>,
}

impl PipelineBuilder {
    /// Wraps the whole chain: first to see the request, last to see the outcome.
    pub fn access_log(mut self, access_log: AccessLogFilter) -> Self {
        self.access_log = Some(access_log);
        self
    }

    pub fn filter(mut self, filter: impl GatewayFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Answers unavailable/timed-out routes with the service's fallback
    /// instead of the classified error.
    pub fn fallback_on_failure(mut self, router: FallbackRouter) -> Self {
        self.fallback = Some(router);
        self
    }

    pub fn build(mut self) -> Pipeline {
        // stable: equal priorities keep registration order
        self.filters.sort_by_key(|f| f.order());

        Pipeline {
            access_log: self.access_log,
            filters: self.filters,
            forwarder: self.forwarder,
            classifier: ErrorClassifier::new(),
            renderer: self.renderer,
            fallback: self.fallback,
            log: self.log,
        }
    }
}
