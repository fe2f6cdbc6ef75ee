pub mod provider;

use crate::error::RouterError;
use crate::model::{GenerationResult, QueryParams};
use provider::ProviderClient;
use tracing::{info, warn};

/// Picks the upstream for a request: Primary first with a single hop to
/// Fallback, or Fallback only when `force_fallback` is set.
pub struct ProviderRouter {
    primary: ProviderClient,
    fallback: ProviderClient,
    force_fallback: bool,
}

impl ProviderRouter {
    pub fn new(primary: ProviderClient, fallback: ProviderClient, force_fallback: bool) -> Self {
        Self {
            primary,
            fallback,
            force_fallback,
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        params: &QueryParams,
    ) -> Result<GenerationResult, RouterError> {
        if self.force_fallback {
            return self
                .fallback
                .generate(prompt, params)
                .await
                .map_err(RouterError::Fallback);
        }

        let primary_err = match self.primary.generate(prompt, params).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        warn!(error = %primary_err, "Primary provider failed, trying fallback");

        match self.fallback.generate(prompt, params).await {
            Ok(result) => {
                info!("Fallback provider succeeded");
                Ok(result)
            }
            Err(fallback_err) => Err(RouterError::BothFailed {
                primary: primary_err,
                fallback: fallback_err,
            }),
        }
    }
}
