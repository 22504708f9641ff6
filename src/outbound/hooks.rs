//! Per-strategy request hooks: the single choke point of outbound calls.
//!
//! Each strategy slot holds the client's original hook (recorded once,
//! first write wins) and at most one installed interceptor. Every outbound
//! call runs `interceptor` then `original` through [`OutboundHooks::apply`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, HeaderValue, Method};
use serde::{Deserialize, Serialize};

use crate::http::context::CorrelationContext;

static GLOBAL: OnceLock<OutboundHooks> = OnceLock::new();
static PASSTHROUGH: OnceLock<SharedHook> = OnceLock::new();
static CORRELATION: OnceLock<SharedHook> = OnceLock::new();

/// Outbound HTTP client families that expose the hook point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpStrategy {
    /// [`TracedClient`](crate::outbound::TracedClient) around `reqwest::Client`.
    Reqwest,
    /// [`PropagationLayer`](crate::outbound::PropagationLayer) around any
    /// tower HTTP client service.
    Tower,
}

impl HttpStrategy {
    pub const ALL: [HttpStrategy; 2] = [HttpStrategy::Reqwest, HttpStrategy::Tower];
}

/// Which strategies the correlation middleware intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundStrategy {
    /// Every strategy compiled into this crate.
    #[default]
    Auto,
    Reqwest,
    Tower,
    Disabled,
}

impl OutboundStrategy {
    pub fn resolve(self) -> Vec<HttpStrategy> {
        match self {
            OutboundStrategy::Auto => HttpStrategy::ALL.to_vec(),
            OutboundStrategy::Reqwest => vec![HttpStrategy::Reqwest],
            OutboundStrategy::Tower => vec![HttpStrategy::Tower],
            OutboundStrategy::Disabled => Vec::new(),
        }
    }
}

/// Sees every outbound call of a strategy before it is sent.
pub trait RequestHook: Send + Sync {
    fn on_request(&self, method: &Method, url: &str, headers: &mut HeaderMap);
}

pub type SharedHook = Arc<dyn RequestHook>;

/// Leaves the call untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Passthrough {
    pub fn shared() -> SharedHook {
        PASSTHROUGH.get_or_init(|| Arc::new(Passthrough)).clone()
    }
}

impl RequestHook for Passthrough {
    fn on_request(&self, _method: &Method, _url: &str, _headers: &mut HeaderMap) {}
}

/// Adds fixed headers the caller has not set.
///
/// Suited as a client's original hook: it survives every install and
/// restore of the correlation interceptor.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    headers: HeaderMap,
}

impl DefaultHeaders {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Panics if `value` is not valid header text, as `HeaderValue::from_static` does.
    pub fn user_agent(value: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(value));
        Self { headers }
    }
}

impl RequestHook for DefaultHeaders {
    fn on_request(&self, _method: &Method, _url: &str, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Injects the current request's correlation headers.
///
/// Reads the task-local [`CorrelationContext`]; outside of a request it does
/// nothing. The context does not follow `tokio::spawn`: calls made from
/// spawned work see it only when the task was started with
/// [`crate::http::spawn`] or bound with
/// [`InCurrentRequest::in_current_request`](crate::http::InCurrentRequest).
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationHook;

impl CorrelationHook {
    /// The process-wide instance. Installing it repeatedly is a no-op.
    pub fn shared() -> SharedHook {
        CORRELATION.get_or_init(|| Arc::new(CorrelationHook)).clone()
    }
}

impl RequestHook for CorrelationHook {
    fn on_request(&self, method: &Method, url: &str, headers: &mut HeaderMap) {
        if let Some(ctx) = CorrelationContext::current() {
            ctx.apply_outbound(headers);
            tracing::trace!(%method, %url, request_id = %ctx.request_id, "Injected correlation headers");
        }
    }
}

#[derive(Default)]
struct Slot {
    original: Option<SharedHook>,
    interceptor: Option<SharedHook>,
}

/// Hook registry shared by the middleware and the outbound clients.
///
/// Cloning yields a handle to the same state.
#[derive(Clone, Default)]
pub struct OutboundHooks {
    slots: Arc<RwLock<HashMap<HttpStrategy, Slot>>>,
}

impl fmt::Debug for OutboundHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed: Vec<HttpStrategy> = HttpStrategy::ALL
            .into_iter()
            .filter(|s| self.is_installed(*s))
            .collect();
        f.debug_struct("OutboundHooks")
            .field("installed", &installed)
            .finish()
    }
}

impl OutboundHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static OutboundHooks {
        GLOBAL.get_or_init(OutboundHooks::new)
    }

    /// Record the original hook of a strategy: the client's own behaviour,
    /// registered by the host application when it builds its clients (see
    /// [`DefaultHeaders`]). It runs after any interceptor and is never
    /// replaced. Only the first call has an effect; returns whether this call
    /// recorded it.
    pub fn set_original(&self, strategy: HttpStrategy, hook: SharedHook) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let slot = slots.entry(strategy).or_default();
        if slot.original.is_some() {
            return false;
        }
        slot.original = Some(hook);
        true
    }

    /// The strategy's original hook, never an installed interceptor.
    pub fn original(&self, strategy: HttpStrategy) -> SharedHook {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(&strategy)
            .and_then(|slot| slot.original.clone())
            .unwrap_or_else(Passthrough::shared)
    }

    /// Install an interceptor. Installing the identical hook again is a
    /// no-op; returns whether anything changed.
    pub fn install(&self, strategy: HttpStrategy, hook: SharedHook) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let slot = slots.entry(strategy).or_default();
        if let Some(current) = &slot.interceptor {
            if Arc::ptr_eq(current, &hook) {
                return false;
            }
        }
        slot.interceptor = Some(hook);
        tracing::debug!(strategy = ?strategy, "Outbound interceptor installed");
        true
    }

    pub fn is_installed(&self, strategy: HttpStrategy) -> bool {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(&strategy)
            .is_some_and(|slot| slot.interceptor.is_some())
    }

    /// Remove every installed interceptor, keeping the originals.
    pub fn restore_originals(&self) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        for slot in slots.values_mut() {
            slot.interceptor = None;
        }
    }

    /// Run the hooks of `strategy` for one outbound call.
    pub fn apply(&self, strategy: HttpStrategy, method: &Method, url: &str, headers: &mut HeaderMap) {
        let (interceptor, original) = {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            match slots.get(&strategy) {
                Some(slot) => (slot.interceptor.clone(), slot.original.clone()),
                None => (None, None),
            }
        };

        if let Some(interceptor) = interceptor {
            interceptor.on_request(method, url, headers);
        }
        if let Some(original) = original {
            original.on_request(method, url, headers);
        }
    }
}
