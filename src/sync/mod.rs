//! # Sync Controller
//!
//! Keeps the rendered card and the page address in step with the settings.
//!
//! ```text
//!  SettingsStore ──watch──► dispatcher ──notify──► render task ──► card
//!  source image ──watch──►      │      ──notify──► persist task ──► page address
//!  font list   ──watch──►       └──spawn──► font detector (markup changes only)
//! ```
//!
//! The dispatcher turns observed changes into two coalescing signals. Each
//! action task waits for its signal to go quiet for [`SyncConfig::quiet_period`]
//! and then reads the *current* snapshot, so the last write before the
//! action settles wins. The two actions write disjoint outputs and run
//! independently.

pub mod debounce;

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::error::CardError;
use crate::fonts::{FontReadinessDetector, LoadOutcome};
use crate::render::{CardRenderer, RenderedCard, SourceImage};
use crate::settings::{PageAddress, Settings, SettingsStore};

/// Sync timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Quiet time after the last trigger before an action runs
    pub quiet_period: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(1000),
        }
    }
}

/// Progress of the most recent font load.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum FontStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Shown next to the font markup field
    Failed(String),
}

/// Counters of completed actions.
#[derive(Debug, Default)]
pub struct SyncStats {
    renders: AtomicU64,
    persists: AtomicU64,
    font_loads: AtomicU64,
}

impl SyncStats {
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn persists(&self) -> u64 {
        self.persists.load(Ordering::SeqCst)
    }

    /// Font loads started (including ones that failed or were no-ops)
    pub fn font_loads(&self) -> u64 {
        self.font_loads.load(Ordering::SeqCst)
    }
}

/// Shared handles the background tasks write to.
struct Outputs {
    card: watch::Sender<Option<Arc<RenderedCard>>>,
    address: watch::Sender<PageAddress>,
    font_status: watch::Sender<FontStatus>,
    stats: SyncStats,
    render: Notify,
    persist: Notify,
}

/// Background tasks tying a [`SettingsStore`] to its outputs.
///
/// Dropping the controller stops its tasks.
pub struct SyncController {
    store: SettingsStore,
    outputs: Arc<Outputs>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncController {
    /// Start the dispatcher and the two action tasks.
    ///
    /// If the initial settings carry font markup a font load starts right
    /// away; if an image is already present a render is scheduled.
    pub fn spawn(
        store: SettingsStore,
        renderer: CardRenderer,
        detector: Arc<FontReadinessDetector>,
        address: PageAddress,
        config: SyncConfig,
    ) -> Self {
        let (card, _) = watch::channel(None);
        let (address, _) = watch::channel(address);
        let (font_status, _) = watch::channel(FontStatus::Idle);
        let outputs = Arc::new(Outputs {
            card,
            address,
            font_status,
            stats: SyncStats::default(),
            render: Notify::new(),
            persist: Notify::new(),
        });

        // Subscribe before anything else can touch the store
        let mut settings_rx = store.subscribe();
        let image_rx = store.subscribe_image();
        let fonts_rx = detector.subscribe();
        let initial = settings_rx.borrow_and_update().clone();

        if !initial.font_stylesheet_markup.trim().is_empty() {
            spawn_font_load(detector.clone(), outputs.clone(), initial.font_stylesheet_markup.clone());
        }
        if store.image().is_some() {
            outputs.render.notify_one();
        }

        let tasks = vec![
            tokio::spawn(dispatch(
                Inputs {
                    settings: settings_rx,
                    image: image_rx,
                    fonts: fonts_rx,
                },
                detector,
                outputs.clone(),
                initial,
            )),
            tokio::spawn(render_loop(store.clone(), renderer, outputs.clone(), config)),
            tokio::spawn(persist_loop(store.clone(), outputs.clone(), config)),
        ];

        Self {
            store,
            outputs,
            tasks,
        }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Latest rendered card, if any render has completed.
    pub fn card(&self) -> Option<Arc<RenderedCard>> {
        self.outputs.card.borrow().clone()
    }

    pub fn subscribe_card(&self) -> watch::Receiver<Option<Arc<RenderedCard>>> {
        self.outputs.card.subscribe()
    }

    pub fn address(&self) -> PageAddress {
        self.outputs.address.borrow().clone()
    }

    pub fn subscribe_address(&self) -> watch::Receiver<PageAddress> {
        self.outputs.address.subscribe()
    }

    pub fn font_status(&self) -> FontStatus {
        self.outputs.font_status.borrow().clone()
    }

    pub fn stats(&self) -> &SyncStats {
        &self.outputs.stats
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Receivers the dispatcher watches.
struct Inputs {
    settings: watch::Receiver<Settings>,
    image: watch::Receiver<Option<Arc<SourceImage>>>,
    fonts: watch::Receiver<Vec<String>>,
}

/// Turn input changes into action triggers.
async fn dispatch(
    inputs: Inputs,
    detector: Arc<FontReadinessDetector>,
    outputs: Arc<Outputs>,
    mut last: Settings,
) {
    let Inputs {
        settings: mut settings_rx,
        image: mut image_rx,
        fonts: mut fonts_rx,
    } = inputs;

    loop {
        tokio::select! {
            changed = settings_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = settings_rx.borrow_and_update().clone();
                if current.visually_differs(&last) {
                    outputs.render.notify_one();
                }
                if current != last {
                    outputs.persist.notify_one();
                }
                if current.font_stylesheet_markup != last.font_stylesheet_markup {
                    if current.font_stylesheet_markup.trim().is_empty() {
                        outputs.font_status.send_replace(FontStatus::Idle);
                    } else {
                        spawn_font_load(detector.clone(), outputs.clone(), current.font_stylesheet_markup.clone());
                    }
                }
                last = current;
            }
            changed = image_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                outputs.render.notify_one();
            }
            changed = fonts_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                outputs.render.notify_one();
            }
        }
    }
}

async fn render_loop(
    store: SettingsStore,
    renderer: CardRenderer,
    outputs: Arc<Outputs>,
    config: SyncConfig,
) {
    loop {
        debounce::settled(&outputs.render, config.quiet_period).await;

        let Some(image) = store.image() else {
            continue;
        };
        let settings = store.snapshot();

        match renderer.render(image, settings).await {
            Ok(card) => {
                outputs.card.send_replace(Some(Arc::new(card)));
                outputs.stats.renders.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => eprintln!("[render] Render aborted: {}", e),
        }
    }
}

async fn persist_loop(store: SettingsStore, outputs: Arc<Outputs>, config: SyncConfig) {
    loop {
        debounce::settled(&outputs.persist, config.quiet_period).await;

        let settings = store.snapshot();
        outputs.address.send_modify(|address| address.replace(&settings));
        outputs.stats.persists.fetch_add(1, Ordering::SeqCst);
    }
}

fn spawn_font_load(detector: Arc<FontReadinessDetector>, outputs: Arc<Outputs>, markup: String) {
    outputs.stats.font_loads.fetch_add(1, Ordering::SeqCst);
    outputs.font_status.send_replace(FontStatus::Loading);

    tokio::spawn(async move {
        let status = match detector.load(&markup).await {
            Ok(LoadOutcome::Loaded { .. }) | Ok(LoadOutcome::AlreadyRequested { .. }) => FontStatus::Ready,
            Err(e @ CardError::StylesheetNotFound) => FontStatus::Failed(e.to_string()),
            Err(e) => {
                eprintln!("[fonts] Font load failed: {}", e);
                FontStatus::Failed(e.to_string())
            }
        };
        outputs.font_status.send_replace(status);
    });
}
