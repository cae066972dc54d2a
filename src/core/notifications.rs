use crate::core::models::UpdateEvent;
use anyhow::Result;
use notify_rust::Notification;

pub fn send_update_notification(event: UpdateEvent) -> Result<()> {
    let (summary, body) = match event {
        UpdateEvent::Completed => (
            "News sentiment updated",
            "Latest news and sentiment scores are ready.",
        ),
        UpdateEvent::Failed => (
            "News sentiment update failed",
            "The refresh did not finish. Try again in a moment.",
        ),
    };

    Notification::new()
        .summary(summary)
        .body(body)
        .appname("sentiment-refresh")
        .timeout(notify_rust::Timeout::Milliseconds(5000))
        .show()?;

    tracing::info!(event = event.name(), "Sent desktop notification");

    Ok(())
}
