use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::{Config, StoreBackend};
use crate::mastery::MasteryEngine;
use crate::services::{DefinitionService, LLMProvider, LlmDefinitionService};
use crate::session::SessionRegistry;
use crate::store::{InMemoryTermStore, RtdbTermStore, TermStore};

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    engine: MasteryEngine,
    sessions: Arc<SessionRegistry>,
    store_backend: StoreBackend,
    llm_available: bool,
}

impl AppState {
    pub fn new(engine: MasteryEngine, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            engine,
            sessions,
            store_backend: StoreBackend::Memory,
            llm_available: true,
        }
    }

    /// Wires the store and definition service named by `config`. An `rtdb`
    /// backend without `STORE_URL` falls back to the in-memory store.
    pub fn from_config(config: &Config) -> Self {
        let (store, store_backend): (Arc<dyn TermStore>, StoreBackend) =
            match (config.store_backend, config.rtdb.clone()) {
                (StoreBackend::Rtdb, Some(rtdb)) => {
                    tracing::info!(base_url = %rtdb.base_url, "using realtime database term store");
                    (Arc::new(RtdbTermStore::new(rtdb)), StoreBackend::Rtdb)
                }
                (StoreBackend::Rtdb, None) => {
                    tracing::warn!("STORE_BACKEND=rtdb but STORE_URL is not set, using in-memory store");
                    (Arc::new(InMemoryTermStore::new()), StoreBackend::Memory)
                }
                (StoreBackend::Memory, _) => (Arc::new(InMemoryTermStore::new()), StoreBackend::Memory),
            };

        let provider = LLMProvider::new(config.llm.clone());
        let llm_available = provider.is_available();
        if llm_available {
            tracing::info!(model = provider.model(), "definition service configured");
        } else {
            tracing::warn!("LLM_API_KEY not set, lookups and grading will fail");
        }
        let definitions = LlmDefinitionService::new(provider);
        let definitions: Arc<dyn DefinitionService> = Arc::new(definitions);

        let engine = MasteryEngine::new(config.mastery.clone(), store, definitions, config.retry);
        let sessions = Arc::new(SessionRegistry::new(config.session_idle_ttl));

        Self {
            store_backend,
            llm_available,
            ..Self::new(engine, sessions)
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn engine(&self) -> &MasteryEngine {
        &self.engine
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    pub fn llm_available(&self) -> bool {
        self.llm_available
    }
}
