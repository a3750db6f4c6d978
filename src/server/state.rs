//! Server state and configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::fonts::{FontFetcher, FontReadinessDetector, FontRegistry, PollConfig};
use crate::render::CardRenderer;
use crate::settings::{PageAddress, SettingsStore};
use crate::sync::{SyncConfig, SyncController};

/// Sessions idle for longer than this are dropped.
pub const SESSION_EXPIRATION_SECS: u64 = 60 * 60;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Directory of `.ttf`/`.otf` files loaded at startup
    pub font_dir: Option<PathBuf>,
    pub sync: SyncConfig,
    pub poll: PollConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            font_dir: None,
            sync: SyncConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

/// One open card page.
pub struct CardSession {
    pub controller: Arc<SyncController>,
    pub last_accessed: Instant,
}

impl CardSession {
    pub fn new(controller: SyncController) -> Self {
        Self {
            controller: Arc::new(controller),
            last_accessed: Instant::now(),
        }
    }

    /// Update last accessed time.
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    /// Unix timestamp of server boot for cache busting.
    pub boot_time: u64,
    pub fonts: Arc<FontRegistry>,
    pub detector: Arc<FontReadinessDetector>,
    pub renderer: CardRenderer,
    pub sessions: RwLock<HashMap<Uuid, CardSession>>,
}

impl AppState {
    pub fn new(config: ServerConfig, fonts: Arc<FontRegistry>, fetcher: Arc<dyn FontFetcher>) -> Self {
        let boot_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let detector = Arc::new(FontReadinessDetector::new(fonts.clone(), fetcher, config.poll));
        Self {
            renderer: CardRenderer::new(fonts.clone()),
            config,
            boot_time,
            fonts,
            detector,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a session seeded from a page-address query.
    pub async fn create_session(&self, query: &str) -> (Uuid, Arc<SyncController>) {
        let store = SettingsStore::from_query(query);
        let controller = SyncController::spawn(
            store,
            self.renderer.clone(),
            self.detector.clone(),
            PageAddress::new("/", query),
            self.config.sync,
        );

        let id = Uuid::new_v4();
        let session = CardSession::new(controller);
        let controller = session.controller.clone();
        self.sessions.write().await.insert(id, session);
        (id, controller)
    }

    /// Look up a session and keep it alive.
    pub async fn session(&self, id: &Uuid) -> Option<Arc<SyncController>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.touch();
        Some(session.controller.clone())
    }
}
