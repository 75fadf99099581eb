use anyhow::Result;

use crate::app::App;

pub fn run(app: &App) -> Result<()> {
    let feeds = app.calendars.feeds();
    let notion = app.calendars.notion_calendars();

    if feeds.is_empty() && notion.is_empty() {
        println!("No calendars configured.");
        println!("Add one with `famcal add <name> <url>` or `famcal add-notion <name> --token ... --database-id ...`");
        return Ok(());
    }

    if !feeds.is_empty() {
        println!("iCal feeds:");
        for feed in feeds {
            println!(
                "  {} {} - {} events{}",
                if feed.enabled { "●" } else { "○" },
                feed.name,
                feed.event_count.unwrap_or(0),
                match feed.last_sync {
                    Some(ts) => format!(", last synced {}", ts.format("%Y-%m-%d %H:%M")),
                    None => ", never synced".to_string(),
                }
            );
        }
    }

    if !notion.is_empty() {
        println!("Notion calendars:");
        for calendar in notion {
            println!(
                "  {} {} - {} events{}",
                if calendar.enabled { "●" } else { "○" },
                calendar.name,
                calendar.event_count.unwrap_or(0),
                match calendar.last_sync {
                    Some(ts) => format!(", last synced {}", ts.format("%Y-%m-%d %H:%M")),
                    None => ", never synced".to_string(),
                }
            );
        }
    }

    Ok(())
}
