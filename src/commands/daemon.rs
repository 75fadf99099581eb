use std::time::Duration;

use anyhow::Result;
use famcal_core::{RefreshKind, process_sync_queue};

use crate::app::App;

/// Run the background scheduler until ctrl-c.
///
/// Batches fetch feed data into the durable queue; whenever a batch
/// completes, this loop plays the foreground role and drains the queue into
/// the event stores.
pub async fn run(app: App, interval_hours: u64) -> Result<()> {
    let registered = app.scheduler.register_one_shot_sync().await;
    let periodic = app
        .scheduler
        .register_periodic_sync(Duration::from_secs(interval_hours.max(1) * 60 * 60))
        .await;

    println!(
        "famcal daemon running (initial sync: {}, periodic: every {}h). Press ctrl-c to stop.",
        if registered { "scheduled" } else { "unavailable" },
        interval_hours.max(1)
    );
    if !periodic {
        eprintln!("Periodic sync registration failed; falling back to manual syncs only.");
    }

    let mut signals = app.bus.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
            signal = signals.recv() => {
                match signal {
                    Ok(signal) if signal.kind == RefreshKind::All => {
                        let drained = process_sync_queue(&app.queue, &app.ical, &app.bus).await;
                        if drained.total_calendars > 0 {
                            println!(
                                "Applied {}/{} background sync result(s).",
                                drained.synced_count, drained.total_calendars
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "event bus receive lagged");
                    }
                }
            }
        }
    }

    app.scheduler.shutdown().await;
    Ok(())
}
