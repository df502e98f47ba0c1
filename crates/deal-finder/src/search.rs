use std::time::Duration;

use tracing::{info, warn};

use deal_common::mcp_api::DealSource;
use deal_common::model::{Deal, ProviderKind, ALL_CATEGORIES};

use crate::mock::MockDealGenerator;
use crate::parser::{self, ParseError};
use crate::providers::{build_prompt, ProviderError, ProviderRegistry};

/// Category recorded on provider deals that omit one when the search was
/// not restricted to a category.
const GENERAL_CATEGORY: &str = "General";

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub source: DealSource,
    pub deals: Vec<Deal>,
}

#[derive(Debug, thiserror::Error)]
enum LiveSearchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Picks the active provider, and substitutes mock data whenever the live
/// path cannot produce deals.
///
/// Built from one settings snapshot; a settings change builds a new one.
pub struct SearchOrchestrator {
    active: ProviderKind,
    registry: ProviderRegistry,
    mock: MockDealGenerator,
    timeout: Duration,
}

impl SearchOrchestrator {
    pub fn new(
        active: ProviderKind,
        registry: ProviderRegistry,
        mock: MockDealGenerator,
        timeout: Duration,
    ) -> Self {
        Self {
            active,
            registry,
            mock,
            timeout,
        }
    }

    pub fn active_provider(&self) -> ProviderKind {
        self.active
    }

    pub fn has_client(&self, provider: ProviderKind) -> bool {
        self.registry.contains(provider)
    }

    /// Never fails: any live-path error is logged and answered with mock deals.
    pub async fn search(&self, query: &str, category: &str) -> SearchOutcome {
        if self.active.is_live() {
            match self.search_live(query, category).await {
                Ok(deals) => {
                    info!(
                        provider = %self.active,
                        count = deals.len(),
                        "live search succeeded"
                    );
                    return SearchOutcome {
                        source: DealSource::Live,
                        deals,
                    };
                }
                Err(e) => warn!(
                    provider = %self.active,
                    error = %e,
                    "live search failed, falling back to mock deals"
                ),
            }
        }

        let deals = self.mock.generate(query, category);
        info!(count = deals.len(), "served mock deals");
        SearchOutcome {
            source: DealSource::Mock,
            deals,
        }
    }

    async fn search_live(&self, query: &str, category: &str) -> Result<Vec<Deal>, LiveSearchError> {
        let adapter = self
            .registry
            .get(self.active)
            .ok_or(ProviderError::MissingCredential(self.active))?;

        let prompt = build_prompt(query, category);
        let reply = tokio::time::timeout(self.timeout, adapter.call(&prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        Ok(parser::parse(&reply, category_fallback(category))?)
    }
}

fn category_fallback(category: &str) -> &str {
    let category = category.trim();
    if category.is_empty() || category.eq_ignore_ascii_case(ALL_CATEGORIES) {
        GENERAL_CATEGORY
    } else {
        category
    }
}
