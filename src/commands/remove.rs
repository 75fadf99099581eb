use anyhow::{Result, bail};
use famcal_core::normalize_key;

use crate::app::App;

/// Remove a calendar by name or id, deleting its stored events with it.
pub async fn run(app: &App, calendar: &str) -> Result<()> {
    if let Some(feed) = app
        .calendars
        .feeds()
        .into_iter()
        .find(|f| f.id == calendar || normalize_key(&f.name) == normalize_key(calendar))
    {
        app.calendars.delete_feed(&feed.id)?;
        app.events.remove_ical_calendar(&feed.id)?;
        println!("Removed calendar '{}' and its events.", feed.name);
        return Ok(());
    }

    if let Some(notion) = app
        .calendars
        .notion_calendars()
        .into_iter()
        .find(|c| c.id == calendar || normalize_key(&c.name) == normalize_key(calendar))
    {
        app.calendars.delete_notion(&notion.id)?;
        app.events.remove_notion_calendar(&notion.id)?;
        println!("Removed Notion calendar '{}' and its events.", notion.name);
        return Ok(());
    }

    bail!("Calendar not found: {}", calendar);
}
