use anyhow::Result;

use crate::app::App;

pub async fn run(app: &App) -> Result<()> {
    let feeds = app.calendars.feeds();
    let notion = app.calendars.notion_calendars();
    let pending = app.queue.pending().await;
    let ical_events = app.events.ical_events().len();

    println!(
        "{} iCal feed(s), {} Notion calendar(s)",
        feeds.len(),
        notion.len()
    );
    println!("{} stored iCal occurrences", ical_events);

    if pending > 0 {
        println!(
            "{} background sync result(s) waiting - run `famcal sync --all` to apply them",
            pending
        );
    } else {
        println!("No pending background sync results.");
    }

    for feed in &feeds {
        match feed.last_sync {
            Some(ts) => println!("  {} last synced {}", feed.name, ts.format("%Y-%m-%d %H:%M")),
            None => println!("  {} never synced", feed.name),
        }
    }
    for calendar in &notion {
        match calendar.last_sync {
            Some(ts) => println!(
                "  {} last synced {}",
                calendar.name,
                ts.format("%Y-%m-%d %H:%M")
            ),
            None => println!("  {} never synced", calendar.name),
        }
    }

    Ok(())
}
