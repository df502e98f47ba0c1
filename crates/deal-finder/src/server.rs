/// MCP server exposing the deal finder to a client UI.
///
/// Tools:
/// - `search_deals`: search the active provider, with mock fallback
/// - `get_settings`: active provider and which providers have keys
/// - `save_settings`: persist provider choice and keys, then rebuild clients
/// - `check_api_key`: whether a provider has a stored key
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use deal_common::mcp_api::{
    CheckApiKeyParams, CheckApiKeyResponse, SaveSettingsResponse, SearchDealsParams,
    SearchDealsResponse, SettingsResponse,
};
use deal_common::model::{ProviderKind, Settings, SettingsUpdate, ALL_CATEGORIES};
use deal_common::settings::SettingsStore;

use crate::config::ProviderConfig;
use crate::mock::MockDealGenerator;
use crate::present::{results_summary, sort_deals, SortKey, StockLevel};
use crate::providers::ProviderRegistry;
use crate::search::SearchOrchestrator;

/// Build the orchestrator for one settings snapshot.
pub fn build_orchestrator(settings: &Settings, config: &ProviderConfig) -> SearchOrchestrator {
    SearchOrchestrator::new(
        settings.active_provider,
        ProviderRegistry::from_settings(settings, config),
        MockDealGenerator::new(),
        config.timeout,
    )
}

#[derive(Clone)]
pub struct DealFinderServer {
    store: Arc<dyn SettingsStore>,
    providers: ProviderConfig,
    orchestrator: Arc<RwLock<Arc<SearchOrchestrator>>>,
    /// Held across store write and rebuild so the live orchestrator always
    /// reflects the last completed save.
    save_lock: Arc<Mutex<()>>,
    tool_router: ToolRouter<DealFinderServer>,
}

impl DealFinderServer {
    pub fn new(store: Arc<dyn SettingsStore>, providers: ProviderConfig, settings: &Settings) -> Self {
        let orchestrator = build_orchestrator(settings, &providers);
        Self {
            store,
            providers,
            orchestrator: Arc::new(RwLock::new(Arc::new(orchestrator))),
            save_lock: Arc::new(Mutex::new(())),
            tool_router: Self::tool_router(),
        }
    }

    async fn current(&self) -> Arc<SearchOrchestrator> {
        Arc::clone(&*self.orchestrator.read().await)
    }

    /// Swap in an orchestrator built from freshly saved settings.
    async fn reload(&self, settings: &Settings) {
        let rebuilt = Arc::new(build_orchestrator(settings, &self.providers));
        let active = settings.active_provider;
        if active.is_live() && !rebuilt.has_client(active) {
            warn!(provider = %active, "active provider has no client, searches will use mock deals");
        }
        *self.orchestrator.write().await = rebuilt;
        info!(provider = %active, "provider clients reinitialized");
    }
}

#[tool_router]
impl DealFinderServer {
    #[tool(description = "Search Black Friday deals using the active provider. Falls back to generated sample deals if the provider is unconfigured or fails. Optional category (default 'all') and sort ('discount', 'price-low', 'price-high', 'rating', 'savings').")]
    async fn search_deals(
        &self,
        Parameters(params): Parameters<SearchDealsParams>,
    ) -> Result<Json<SearchDealsResponse>, String> {
        let query = params.query.unwrap_or_default().trim().to_string();
        let category = params
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| ALL_CATEGORIES.to_string());
        let sort = match params.sort.as_deref().map(str::trim) {
            None | Some("") => Some(SortKey::default()),
            Some(raw) => raw
                .parse::<SortKey>()
                .inspect_err(|e| warn!(error = %e, "ignoring sort key"))
                .ok(),
        };

        let orchestrator = self.current().await;
        let outcome = orchestrator.search(&query, &category).await;
        let deals = sort_deals(outcome.deals, sort);
        let low_stock = deals
            .iter()
            .filter(|d| StockLevel::of(d) == StockLevel::Low)
            .map(|d| d.id.clone())
            .collect();

        Ok(Json(SearchDealsResponse {
            source: outcome.source,
            provider: orchestrator.active_provider(),
            summary: results_summary(deals.len(), &category),
            low_stock,
            deals,
        }))
    }

    #[tool(description = "Get the active provider and which providers have an API key stored. Keys are never returned.")]
    async fn get_settings(&self) -> Result<Json<SettingsResponse>, String> {
        let settings = self.store.load().await;
        Ok(Json(SettingsResponse {
            ai_provider: settings.active_provider,
            configured: ProviderKind::LIVE
                .into_iter()
                .map(|kind| (kind, settings.has_key(kind)))
                .collect(),
        }))
    }

    #[tool(description = "Save the active provider and API keys. An empty key keeps the previously stored key for that provider. Provider clients are rebuilt immediately.")]
    async fn save_settings(
        &self,
        Parameters(update): Parameters<SettingsUpdate>,
    ) -> Result<Json<SaveSettingsResponse>, String> {
        let _guard = self.save_lock.lock().await;
        match self.store.save(update).await {
            Ok(settings) => {
                self.reload(&settings).await;
                Ok(Json(SaveSettingsResponse {
                    success: true,
                    error: None,
                }))
            }
            Err(e) => {
                warn!(error = %e, "settings save failed");
                Ok(Json(SaveSettingsResponse {
                    success: false,
                    error: Some(e.to_string()),
                }))
            }
        }
    }

    #[tool(description = "Check whether an API key is stored for a provider ('openai', 'anthropic', 'gemini', 'perplexity'). The mock provider never needs one.")]
    async fn check_api_key(
        &self,
        Parameters(params): Parameters<CheckApiKeyParams>,
    ) -> Result<Json<CheckApiKeyResponse>, String> {
        let provider = params
            .provider
            .parse::<ProviderKind>()
            .map_err(|e| e.to_string())?;
        let settings = self.store.load().await;
        let has_key = !provider.is_live() || settings.has_key(provider);
        Ok(Json(CheckApiKeyResponse { has_key }))
    }
}

#[tool_handler]
impl ServerHandler for DealFinderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "deal-finder".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Black Friday deal finder. Call search_deals with a query, category and sort key. \
Use get_settings/save_settings to choose the provider (openai, anthropic, gemini, perplexity \
or mock) and store API keys, and check_api_key to see whether a provider is ready."
                    .to_string(),
            ),
        }
    }
}
