use crate::cli::{http_client, load_settings, state_store, Overrides};
use crate::client::JobStatusClient;
use crate::controller::cooldown_text;
use crate::core::clock::minutes_until;
use crate::core::models::JobStatus;
use crate::core::store::PersistedState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
struct StatusOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_error: Option<String>,
    local: LocalStatus,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LocalStatus {
    state_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<PersistedState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run(overrides: &Overrides, json: bool) -> Result<()> {
    let settings = load_settings(overrides)?;
    let client = http_client(&settings)?;
    let store = state_store(&settings)?;

    let (backend, backend_error) = match client.fetch_status().await {
        Ok(status) => (Some(status), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let (snapshot, error) = match store.load() {
        Ok(snapshot) => (snapshot, None),
        Err(e) => (None, Some(e.to_string())),
    };

    let output = StatusOutput {
        backend,
        backend_error,
        local: LocalStatus {
            state_file: store.path().display().to_string(),
            snapshot,
            error,
        },
        fetched_at: Utc::now(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn print_text_output(output: &StatusOutput) {
    println!("Backend job:");
    match (&output.backend, &output.backend_error) {
        (Some(status), _) => println!("  {}", describe_backend(status)),
        (None, Some(error)) => println!("  unreachable: {error}"),
        (None, None) => println!("  unknown"),
    }

    println!("Local state ({}):", output.local.state_file);
    if let Some(error) = &output.local.error {
        println!("  unreadable: {error}");
        return;
    }
    match &output.local.snapshot {
        Some(snapshot) => println!("  {}", describe_local(snapshot, output.fetched_at)),
        None => println!("  ready, nothing stored"),
    }
}

fn describe_backend(status: &JobStatus) -> String {
    match status {
        JobStatus::Idle {
            minutes_until_next_update: Some(minutes),
        } if *minutes > 0 => format!("idle, next update allowed in {minutes} min"),
        JobStatus::Idle { .. } => "idle, update allowed".to_string(),
        JobStatus::Running { started_at } | JobStatus::Pending { started_at } => match started_at {
            Some(started) => format!("{} since {started}", status.label()),
            None => status.label().to_string(),
        },
        JobStatus::Failed { message } => format!(
            "failed: {}",
            message.as_deref().unwrap_or("no message")
        ),
    }
}

fn describe_local(snapshot: &PersistedState, now: DateTime<Utc>) -> String {
    if let Some(started) = snapshot.polling_started_at() {
        let elapsed = (now - started).num_seconds().max(0);
        return format!("polling, started {elapsed}s ago");
    }
    match snapshot
        .next_available_at()
        .and_then(|deadline| minutes_until(now, deadline))
    {
        Some(minutes) => format!("cooldown: {}", cooldown_text(minutes)),
        None => "cooldown expired".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_describe_backend() {
        let idle = JobStatus::Idle {
            minutes_until_next_update: Some(4),
        };
        assert_eq!(describe_backend(&idle), "idle, next update allowed in 4 min");

        let ready = JobStatus::Idle {
            minutes_until_next_update: Some(0),
        };
        assert_eq!(describe_backend(&ready), "idle, update allowed");

        let failed = JobStatus::Failed { message: None };
        assert_eq!(describe_backend(&failed), "failed: no message");
    }

    #[test]
    fn test_describe_local() {
        let now = Utc::now();

        let polling = PersistedState::new(None, Some(now - Duration::seconds(42)));
        assert_eq!(describe_local(&polling, now), "polling, started 42s ago");

        let cooldown = PersistedState::new(Some(now + Duration::seconds(90)), None);
        assert_eq!(
            describe_local(&cooldown, now),
            "cooldown: Updated recently. Try in 2 minutes."
        );

        let expired = PersistedState::new(Some(now - Duration::seconds(1)), None);
        assert_eq!(describe_local(&expired, now), "cooldown expired");
    }
}
