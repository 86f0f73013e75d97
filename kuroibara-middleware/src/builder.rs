//! Builder for composing a raw source adapter with middleware layers.
//!
//! # Middleware Ordering Convention
//!
//! Middleware layers form an "onion" around the raw source:
//!
//! ```text
//! Caller
//!     ↓
//! Health Gate   (fails fast on a down source before anything else runs)
//!     ↓
//! Proxy         (selects the proxy used by this call and any retry)
//!     ↓
//! Solver        (detects a bot challenge, solves it, retries once)
//!     ↓
//! Rate Limit    (gates every dispatch — including the solver's retry)
//!     ↓
//! Raw Source    (the adapter making the actual request)
//! ```
//!
//! ## Storage vs Application Order
//!
//! The `layers` vector stores middleware in **outermost-first** order for
//! intuitive builder semantics (last added = outermost), but they are
//! **applied in reverse** during `build()` to construct the proper
//! nesting, matching [`MiddlewareStack`](kuroibara_types::MiddlewareStack)
//! where `layers[0]` is the outermost layer.

use std::sync::Arc;
use std::time::Duration;

use kuroibara_core::middleware::{Middleware, MiddlewareDescriptor, ValidationContext};
use kuroibara_core::source::Source;
use kuroibara_proxy::ProxyPool;
use kuroibara_rate::RateController;
use kuroibara_types::KuroibaraError;
use kuroibara_types::middleware::{MiddlewareLayer, MiddlewareStack};

use crate::health_gate::{Admissibility, HealthGateMiddleware};
use crate::proxy_gate::ProxyMiddleware;
use crate::solver::{ChallengeSolver, SolverMiddleware};

fn ordering_key(name: &str) -> u8 {
    match name {
        "health_gate" => 0,
        "proxy" => 1,
        "solver" => 2,
        "rate_limit" => 3,
        _ => 4,
    }
}

/// Generic middleware builder for composing a source with layered
/// wrappers.
///
/// See [module-level documentation](self) for the ordering convention. The
/// builder stores middleware descriptors (which track type information)
/// and validates dependencies before building the final stack.
pub struct SourceBuilder {
    raw: Arc<dyn Source>,
    /// Middleware layers in outermost-first order.
    layers: Vec<MiddlewareDescriptor>,
}

impl SourceBuilder {
    /// Create a new builder from a raw, unwrapped source adapter.
    #[must_use]
    pub fn new(raw: Arc<dyn Source>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
        }
    }

    fn enforce_ordering(&mut self) {
        self.layers
            .sort_by_key(|d| ordering_key(d.middleware().name()));
    }

    /// Add or replace the health gate layer.
    #[must_use]
    pub fn with_health_gate(mut self, monitor: Arc<dyn Admissibility>) -> Self {
        self.layers.retain(|d| d.name() != "health_gate");
        self.layers
            .push(MiddlewareDescriptor::new(HealthGateMiddleware::new(monitor)));
        self.enforce_ordering();
        self
    }

    /// Add or replace the proxy-selection layer.
    #[must_use]
    pub fn with_proxy(mut self, pool: Arc<ProxyPool>) -> Self {
        self.layers.retain(|d| d.name() != "proxy");
        self.layers.push(MiddlewareDescriptor::new(ProxyMiddleware::new(pool)));
        self.enforce_ordering();
        self
    }

    /// Add or replace the challenge-solver layer.
    #[must_use]
    pub fn with_solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.layers.retain(|d| d.name() != "solver");
        self.layers
            .push(MiddlewareDescriptor::new(SolverMiddleware::new(solver)));
        self.enforce_ordering();
        self
    }

    /// Add or replace the rate-limit layer.
    #[must_use]
    pub fn with_rate_limit(mut self, controller: Arc<RateController>, timeout: Duration) -> Self {
        self.layers.retain(|d| d.name() != "rate_limit");
        self.layers.push(MiddlewareDescriptor::new(
            kuroibara_rate::RateLimitMiddleware::new(controller, timeout),
        ));
        self.enforce_ordering();
        self
    }

    /// Add an arbitrary middleware layer. Custom layers sort after the four
    /// named layers above, preserving relative insertion order among
    /// themselves.
    #[must_use]
    pub fn layer<M: Middleware + 'static>(mut self, layer: M) -> Self {
        self.layers.push(MiddlewareDescriptor::new(layer));
        self.enforce_ordering();
        self
    }

    /// Export the current middleware stack configuration for inspection or
    /// persistence.
    #[must_use]
    pub fn to_stack(&self) -> MiddlewareStack {
        let mut stack = MiddlewareStack::new();
        for desc in &self.layers {
            stack.push_inner(MiddlewareLayer::new(
                desc.name(),
                desc.middleware().config_json(),
            ));
        }
        stack.push_inner(MiddlewareLayer::new(
            "raw_source",
            serde_json::json!({ "name": self.raw.name() }),
        ));
        stack
    }

    /// Validate the middleware stack without building.
    ///
    /// # Errors
    /// Returns [`KuroibaraError::InvalidMiddlewareStack`] if any layer
    /// fails its own `validate`.
    pub fn validate(&self) -> Result<(), KuroibaraError> {
        for (idx, desc) in self.layers.iter().enumerate().rev() {
            let ctx = ValidationContext::new(&self.layers, idx);
            desc.middleware().validate(&ctx)?;
        }
        Ok(())
    }

    /// Build the wrapped source according to the captured stack.
    ///
    /// # Errors
    /// Returns [`KuroibaraError::InvalidMiddlewareStack`] if validation
    /// fails.
    pub fn build(self) -> Result<Arc<dyn Source>, KuroibaraError> {
        self.validate()?;
        let mut acc: Arc<dyn Source> = Arc::clone(&self.raw);
        for desc in self.layers.into_iter().rev() {
            acc = desc.into_middleware().apply(acc);
        }
        Ok(acc)
    }
}
