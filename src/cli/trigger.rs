use crate::cli::{build_controller, http_client, load_settings, Overrides};
use crate::controller::{ControllerView, EventBus, Phase, TriggerOutcome};
use crate::core::models::UpdateEvent;
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Outcome {
    Completed,
    Failed,
    Cooldown,
    Ready,
}

#[derive(Serialize)]
struct TriggerReport {
    outcome: Outcome,
    #[serde(flatten)]
    view: ControllerView,
}

pub async fn run(overrides: &Overrides, json: bool) -> Result<()> {
    let settings = load_settings(overrides)?;
    let events = EventBus::new();
    let mut event_rx = events.subscribe();
    let controller = build_controller(&settings, http_client(&settings)?, events)?;

    let restored = controller.view();
    let outcome = match restored.phase {
        Phase::Cooldown => Outcome::Cooldown,
        Phase::Polling => {
            tracing::info!("An update from a previous run is still in flight, following it");
            wait_for_event(&mut event_rx).await?
        }
        Phase::Ready | Phase::Submitting => match controller.trigger_update().await {
            TriggerOutcome::Polling => {
                if !json {
                    println!("{}", controller.view().button_text);
                }
                wait_for_event(&mut event_rx).await?
            }
            TriggerOutcome::Cooldown { minutes } => {
                tracing::info!(minutes, "Backend asked to wait before the next update");
                Outcome::Cooldown
            }
            TriggerOutcome::Ready => Outcome::Ready,
            TriggerOutcome::Failed => Outcome::Failed,
        },
    };

    let view = controller.view();
    controller.shutdown();

    let failed = matches!(outcome, Outcome::Failed);
    let reason = view.last_failure.clone();

    if json {
        let report = TriggerReport { outcome, view };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&outcome, &view);
    }

    if failed {
        anyhow::bail!(
            "News sentiment update failed: {}",
            reason.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn wait_for_event(
    event_rx: &mut tokio::sync::broadcast::Receiver<UpdateEvent>,
) -> Result<Outcome> {
    let event = event_rx
        .recv()
        .await
        .context("Update controller stopped before the update finished")?;

    Ok(match event {
        UpdateEvent::Completed => Outcome::Completed,
        UpdateEvent::Failed => Outcome::Failed,
    })
}

fn print_text(outcome: &Outcome, view: &ControllerView) {
    match outcome {
        Outcome::Completed => println!("News sentiment updated."),
        Outcome::Failed => println!("News sentiment update failed."),
        Outcome::Ready => println!("Backend is ready for another update."),
        Outcome::Cooldown => {}
    }
    if !view.update_available {
        println!("{}", view.button_text);
    }
}
