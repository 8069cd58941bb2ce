use crate::proxy::PromptProxy;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub proxy: PromptProxy,
    pub rate_limiter: RateLimiter,
    pub expose_details: bool, // dev mode: show error details to clients
}

impl AppState {
    pub fn new(proxy: PromptProxy, rate_limiter: RateLimiter, expose_details: bool) -> Self {
        Self {
            proxy,
            rate_limiter,
            expose_details,
        }
    }
}
