use anyhow::{Result, bail};
use famcal_core::{CalendarFeed, NotionCalendar};

use crate::app::App;

pub async fn run(app: &App, name: &str, url: &str, color: Option<String>) -> Result<()> {
    let feed = CalendarFeed::new(name, url, color.as_deref())?;
    let feed = app.calendars.add_feed(feed)?;

    println!("Added calendar '{}' ({})", feed.name, feed.id);
    println!("Run `famcal sync {}` to fetch its events.", feed.name);
    Ok(())
}

pub async fn run_notion(
    app: &App,
    name: &str,
    token: &str,
    database_id: &str,
    verify: bool,
) -> Result<()> {
    if verify {
        println!("Checking token against the Notion API...");
        if !app.notion_client.validate_token(token).await {
            bail!(
                "Invalid Notion token. Please check your integration token and ensure it has the correct permissions."
            );
        }

        // The id may point at a database or a page; try both before failing.
        if let Err(db_err) = app.notion_client.get_database(database_id, token).await {
            if app.notion_client.get_page(database_id, token).await.is_err() {
                bail!(
                    "Page/database not shared with integration or does not exist: {}",
                    db_err
                );
            }
        }
        println!("Token and database access verified.");
    }

    let calendar = NotionCalendar::new(name, token, database_id)?;
    let calendar = app.calendars.add_notion(calendar)?;

    println!("Added Notion calendar '{}' ({})", calendar.name, calendar.id);
    println!("Run `famcal sync {}` to fetch its events.", calendar.name);
    Ok(())
}
