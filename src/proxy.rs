// The prompt-cache proxy: validate, look up, generate on miss, clean, store.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::cache::{PromptCache, make_cache_key};
use crate::coalesce::{Flight, FlightGuard, Inflight};
use crate::error::GatewayError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, UPSTREAM_ERRORS};
use crate::models::{GenerateResponse, GenerationRequest};
use crate::text::{build_upstream_prompt, clean_output};
use crate::upstream::TextGenerator;

// Cache-fronted generator. Cheap to clone; all state is shared.
//
// Concurrent misses for the same key share one upstream call. That call runs
// in its own task, so it finishes and fills the cache even if every caller
// waiting on it has gone away.
#[derive(Clone)]
pub struct PromptProxy {
    cache: Arc<dyn PromptCache>,
    generator: Arc<dyn TextGenerator>,
    inflight: Arc<Inflight>,
}

impl PromptProxy {
    pub fn new(cache: Arc<dyn PromptCache>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            cache,
            generator,
            inflight: Arc::new(Inflight::new()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn PromptCache> {
        &self.cache
    }

    pub async fn generate(&self, req: GenerationRequest) -> Result<GenerateResponse, GatewayError> {
        let key = make_cache_key(&req);

        if let Some(text) = self.lookup(&key).await {
            CACHE_HITS.inc();
            debug!(%key, "Cache HIT");
            return Ok(GenerateResponse { text, cached: true });
        }
        CACHE_MISSES.inc();

        let rx = match self.inflight.join(&key) {
            Flight::Leader(rx) => {
                debug!(%key, "Cache MISS - calling upstream");
                self.spawn_generation(key, req);
                rx
            }
            Flight::Follower(rx) => {
                debug!(
                    %key,
                    in_flight = self.inflight.in_flight(),
                    "Cache MISS - joining in-flight generation"
                );
                rx
            }
        };

        let text = rx
            .await
            .map_err(|_| GatewayError::Internal("generation task ended without a result".into()))??;
        Ok(GenerateResponse {
            text,
            cached: false,
        })
    }

    // A failing cache reads as a miss
    async fn lookup(&self, key: &str) -> Option<String> {
        match self.cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "Cache read failed, falling through to upstream");
                None
            }
        }
    }

    fn spawn_generation(&self, key: String, req: GenerationRequest) {
        let proxy = self.clone();
        let guard = FlightGuard::new(self.inflight.clone(), key);
        tokio::spawn(async move {
            // a panic in fill drops the guard, which releases the waiters
            let result = proxy.fill(guard.key(), &req).await;
            // cache is written before waiters are released
            guard.finish(result);
        });
    }

    async fn fill(&self, key: &str, req: &GenerationRequest) -> Result<String, GatewayError> {
        let prompt = build_upstream_prompt(req);
        let raw = self.generator.generate(&prompt).await.inspect_err(|e| {
            if matches!(e, GatewayError::Upstream { .. }) {
                UPSTREAM_ERRORS.inc();
            }
            error!(error = %e, "Generation failed");
        })?;

        let text = clean_output(&raw);
        if let Err(e) = self.cache.set(key, text.clone()).await {
            warn!(error = %e, "Cache write failed, serving uncached result");
        }
        Ok(text)
    }
}
