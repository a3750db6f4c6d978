//! # HTTP Server for Invitation Cards
//!
//! Serves the card editor page and the session API behind it.
//!
//! ## Usage
//!
//! ```bash
//! namecard serve --listen 0.0.0.0:8080 --font-dir ./fonts
//! ```
//!
//! Then open http://localhost:8080 in a browser. Any share link produced by
//! the editor (`/?name=...&fontSize=...`) reopens the same card.
//!
//! ## Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/` | Editor page |
//! | POST | `/api/sessions?<query>` | Open a session from a share link |
//! | GET | `/api/sessions/:id` | Session state |
//! | PATCH | `/api/sessions/:id/settings` | Edit settings |
//! | POST | `/api/sessions/:id/image` | Upload the source image |
//! | POST | `/api/sessions/:id/position` | Click-to-reposition |
//! | POST | `/api/sessions/:id/fonts` | Paste font markup |
//! | GET | `/api/sessions/:id/card` | Rendered card |
//! | GET | `/api/fonts` | Available fonts |

mod handlers;
mod state;
mod static_files;

pub use state::{AppState, ServerConfig, SESSION_EXPIRATION_SECS};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;

use crate::error::CardError;
use crate::fonts::{FontRegistry, HttpFetcher};

/// Build the router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Frontend
        .route("/", get(static_files::index_handler))
        .route("/assets/*path", get(static_files::asset_handler))
        // Sessions
        .route("/api/sessions", post(handlers::sessions::create))
        .route("/api/sessions/:id", get(handlers::sessions::show))
        .route(
            "/api/sessions/:id/settings",
            patch(handlers::sessions::update_settings),
        )
        // Uploads up to 50MB
        .route(
            "/api/sessions/:id/image",
            post(handlers::sessions::upload_image).layer(DefaultBodyLimit::max(50 * 1024 * 1024)),
        )
        .route(
            "/api/sessions/:id/position",
            post(handlers::sessions::reposition),
        )
        .route("/api/sessions/:id/fonts", post(handlers::sessions::load_fonts))
        .route("/api/sessions/:id/card", get(handlers::sessions::card))
        // Fonts
        .route("/api/fonts", get(handlers::fonts::list))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use namecard::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), namecard::error::CardError> {
/// let config = ServerConfig {
///     listen_addr: "0.0.0.0:8080".to_string(),
///     ..Default::default()
/// };
///
/// serve(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), CardError> {
    let fonts = Arc::new(FontRegistry::new());
    if let Some(dir) = &config.font_dir {
        let loaded = fonts.load_dir(dir)?;
        println!("[fonts] Loaded {} local faces from {}", loaded, dir.display());
    }

    let fetcher = Arc::new(HttpFetcher::new()?);
    let app_state = Arc::new(AppState::new(config.clone(), fonts, fetcher));

    // Spawn background session cleanup task
    tokio::spawn(cleanup_sessions(app_state.clone()));

    let app = router(app_state);

    println!("namecard HTTP server starting...");
    println!("Listening on: {}", config.listen_addr);
    println!();
    println!("Open http://{}/ in your browser to make a card", config.listen_addr);
    println!();

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            CardError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", config.listen_addr, e),
            ))
        })?;

    axum::serve(listener, app).await?;

    Ok(())
}

/// Background task to drop sessions nobody has touched for a while.
async fn cleanup_sessions(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    let expiration = Duration::from_secs(SESSION_EXPIRATION_SECS);

    loop {
        interval.tick().await;
        let now = Instant::now();

        let mut sessions = state.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, v| now.duration_since(v.last_accessed) < expiration);
        let after = sessions.len();
        if before != after {
            println!(
                "[cache] Cleaned up {} expired sessions ({} remaining)",
                before - after,
                after
            );
        }
    }
}
