use crate::cli::{build_controller, http_client, load_settings, Overrides};
use crate::client::HttpJobClient;
use crate::controller::{ControllerView, EventBus, UpdateController};
use crate::core::models::UpdateEvent;
use crate::core::notifications::send_update_notification;
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

pub async fn run(overrides: &Overrides, symbol: Option<String>, trigger: bool) -> Result<()> {
    let settings = load_settings(overrides)?;
    let client = http_client(&settings)?;
    let controller = build_controller(&settings, Arc::clone(&client), EventBus::new())?;

    if let Some(symbol) = symbol.or_else(|| settings.news.symbol.clone()) {
        tokio::spawn(run_news_listener(
            controller.events().subscribe(),
            client,
            symbol,
            settings.news.page_size,
        ));
    }
    if settings.notifications.enabled {
        tokio::spawn(run_notification_listener(controller.events().subscribe()));
    }

    let mut views = controller.subscribe_view();
    print_view(&views.borrow_and_update());

    if trigger {
        spawn_trigger(&controller);
    }

    println!("Press Enter to update latest news, Ctrl-C to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                print_view(&views.borrow_and_update());
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => {
                        let view = controller.view();
                        if view.update_available {
                            spawn_trigger(&controller);
                        } else {
                            println!("{}", view.button_text);
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read from stdin");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    tracing::debug!(
        polling = controller.is_poll_loop_active(),
        "Stopping watch"
    );
    controller.shutdown();
    Ok(())
}

fn spawn_trigger(controller: &UpdateController) {
    let controller = controller.clone();
    tokio::spawn(async move {
        controller.trigger_update().await;
    });
}

fn print_view(view: &ControllerView) {
    match (&view.last_failure, view.update_available) {
        (Some(reason), true) => println!(
            "[{}] {} (last attempt failed: {reason})",
            view.phase.name(),
            view.button_text
        ),
        _ => println!("[{}] {}", view.phase.name(), view.button_text),
    }
}

/// Re-fetches the headline list whenever an update completes. Knows nothing
/// about the controller, only the event bus.
async fn run_news_listener(
    mut events: broadcast::Receiver<UpdateEvent>,
    client: Arc<HttpJobClient>,
    symbol: String,
    page_size: u32,
) {
    print_news(&client, &symbol, page_size).await;

    loop {
        match events.recv().await {
            Ok(UpdateEvent::Completed) => print_news(&client, &symbol, page_size).await,
            Ok(UpdateEvent::Failed) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "News listener lagged behind update events");
            }
            Err(RecvError::Closed) => return,
        }
    }
}

async fn print_news(client: &HttpJobClient, symbol: &str, page_size: u32) {
    match client.fetch_news(symbol, page_size).await {
        Ok(articles) if articles.is_empty() => println!("No news for {symbol}."),
        Ok(articles) => {
            println!("Latest news for {}:", symbol.to_uppercase());
            for article in articles {
                let score = article
                    .score
                    .map(|s| format!(" {:.0}%", s * 100.0))
                    .unwrap_or_default();
                let date = article.date.as_deref().unwrap_or("");
                println!("  [{}{}] {} {}", article.sentiment(), score, date, article.title);
                if let Some(link) = &article.link {
                    println!("      {link}");
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, symbol, "Failed to fetch news"),
    }
}

async fn run_notification_listener(mut events: broadcast::Receiver<UpdateEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = send_update_notification(event) {
                    tracing::warn!(error = %e, "Failed to send desktop notification");
                }
            }
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return,
        }
    }
}
