//! Application composition root.
//!
//! Every service is constructed once here and handed to the commands;
//! nothing lives in ambient module state.

use std::sync::Arc;

use anyhow::Result;
use famcal_core::{
    CachedFetcher, CalendarStore, EventStore, FeedFetcher, ICalSynchronizer, Notifier,
    NotionClient, NotionClientConfig, NotionSynchronizer, SettingsStore, SyncEventBus, SyncQueue,
    SyncScheduler, default_data_dir,
};

use crate::config::AppConfig;

pub struct App {
    pub calendars: Arc<CalendarStore>,
    pub events: Arc<EventStore>,
    pub settings: Arc<SettingsStore>,
    pub queue: Arc<SyncQueue>,
    pub bus: SyncEventBus,
    pub notion_client: Arc<NotionClient>,
    pub ical: Arc<ICalSynchronizer>,
    pub notion: Arc<NotionSynchronizer>,
    pub scheduler: Arc<SyncScheduler>,
}

/// Toast sink for an interactive terminal.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, message: &str, is_error: bool) {
        if is_error {
            eprintln!("✗ {}: {}", title, message);
        } else {
            println!("✓ {}: {}", title, message);
        }
    }
}

impl App {
    pub fn build(config: &AppConfig) -> Result<Self> {
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        std::fs::create_dir_all(&data_dir)?;

        let app_origin = config
            .app_origin
            .as_deref()
            .and_then(|o| url::Url::parse(o).ok());

        let calendars = Arc::new(CalendarStore::new(data_dir.join("calendars.json")));
        let events = Arc::new(EventStore::new(data_dir.join("events")));
        let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json")));
        let queue = Arc::new(SyncQueue::new(
            data_dir.join("sync_queue.json"),
            settings.clone(),
        ));
        let bus = SyncEventBus::new();
        let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

        let mut notion_config = NotionClientConfig::default();
        if let Some(base) = &config.notion_proxy_base {
            notion_config.base_url = format!("{}/notion", base.trim_end_matches('/'));
        }
        let notion_client = Arc::new(NotionClient::new(notion_config));

        let cached = Arc::new(CachedFetcher::new(data_dir.join("cache"), app_origin)?);
        let ical = Arc::new(ICalSynchronizer::new(
            calendars.clone(),
            events.clone(),
            FeedFetcher::new(cached.clone()),
            bus.clone(),
            notifier.clone(),
        ));
        let notion = Arc::new(NotionSynchronizer::new(
            calendars.clone(),
            events.clone(),
            notion_client.clone(),
            bus.clone(),
            notifier,
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            calendars.clone(),
            FeedFetcher::new(cached),
            queue.clone(),
            notion.clone(),
            bus.clone(),
        ));

        Ok(App {
            calendars,
            events,
            settings,
            queue,
            bus,
            notion_client,
            ical,
            notion,
            scheduler,
        })
    }
}
