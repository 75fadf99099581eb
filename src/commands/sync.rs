use anyhow::{Result, bail};
use famcal_core::{normalize_key, process_sync_queue};

use crate::app::App;

pub async fn run(app: &App, calendar: Option<String>, all: bool) -> Result<()> {
    // Pick up any background results parked in the durable queue first, so
    // a foreground sync never races stale queued data.
    let drained = process_sync_queue(&app.queue, &app.ical, &app.bus).await;
    if drained.total_calendars > 0 {
        println!(
            "Processed {}/{} queued background results.",
            drained.synced_count, drained.total_calendars
        );
    }

    if all {
        return sync_all(app).await;
    }

    let Some(target) = calendar else {
        bail!("Specify a calendar name, or use --all to sync everything.");
    };

    if let Some(feed) = app
        .calendars
        .feeds()
        .into_iter()
        .find(|f| f.id == target || normalize_key(&f.name) == normalize_key(&target))
    {
        let occurrences = app.ical.sync_calendar(&feed).await?;
        println!(
            "Synced {} event occurrences from {}.",
            occurrences.len(),
            feed.name
        );
        return Ok(());
    }

    if let Some(notion) = app
        .calendars
        .notion_calendars()
        .into_iter()
        .find(|c| c.id == target || normalize_key(&c.name) == normalize_key(&target))
    {
        let events = app.notion.sync_calendar(&notion).await?;
        println!("Synced {} events from {}.", events.len(), notion.name);
        return Ok(());
    }

    bail!("Calendar not found: {}", target);
}

/// Full sync: the scheduler's batch fetches feeds into the queue (the same
/// path background sync uses), then the queue is drained into the stores.
async fn sync_all(app: &App) -> Result<()> {
    let summary = app.scheduler.trigger_manual_sync().await;
    let drained = process_sync_queue(&app.queue, &app.ical, &app.bus).await;

    let total_errors = summary.error_count + drained.error_count;
    println!(
        "Synced {}/{} calendars{}",
        summary.synced_count,
        summary.total_calendars,
        if total_errors > 0 {
            format!(" ({} failed)", total_errors)
        } else {
            String::new()
        }
    );

    if total_errors > 0 {
        bail!("{} calendar(s) failed to sync", total_errors);
    }
    Ok(())
}
