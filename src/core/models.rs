use serde::{Deserialize, Serialize};

/// Server-side state of the sentiment refresh job, as reported by
/// `GET /api/sentiment/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "IDLE")]
    Idle {
        #[serde(
            rename = "minutesUntilNextUpdate",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        minutes_until_next_update: Option<u32>,
    },
    #[serde(alias = "RUNNING", alias = "processing", alias = "PROCESSING")]
    Running {
        #[serde(rename = "startedAt", default, skip_serializing_if = "Option::is_none")]
        started_at: Option<String>,
    },
    #[serde(alias = "PENDING")]
    Pending {
        #[serde(rename = "startedAt", default, skip_serializing_if = "Option::is_none")]
        started_at: Option<String>,
    },
    #[serde(alias = "FAILED")]
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Idle { .. } => "idle",
            JobStatus::Running { .. } => "running",
            JobStatus::Pending { .. } => "pending",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// Server answer to `POST /api/sentiment/update` that the controller
/// understands. Everything else is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    RateLimited { minutes: u32 },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RateLimitBody {
    pub minutes_until_next_update: u32,
}

/// Signal broadcast to listeners when a refresh attempt ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateEvent {
    Completed,
    Failed,
}

impl UpdateEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateEvent::Completed => "newsUpdateCompleted",
            UpdateEvent::Failed => "newsUpdateFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl NewsArticle {
    pub fn sentiment(&self) -> &'static str {
        match self.label.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("positive") => "positive",
            Some("negative") => "negative",
            _ => "neutral",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NewsPage {
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<NewsEmbedded>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewsEmbedded {
    #[serde(default)]
    pub text_sentiment_list: Vec<NewsArticle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_idle_with_cooldown() {
        let status: JobStatus =
            serde_json::from_str(r#"{"status":"idle","minutesUntilNextUpdate":7}"#).unwrap();
        assert_eq!(
            status,
            JobStatus::Idle {
                minutes_until_next_update: Some(7)
            }
        );
    }

    #[test]
    fn test_parse_idle_without_cooldown() {
        let status: JobStatus = serde_json::from_str(r#"{"status":"idle"}"#).unwrap();
        assert_eq!(
            status,
            JobStatus::Idle {
                minutes_until_next_update: None
            }
        );
        assert_eq!(status.label(), "idle");
    }

    #[test]
    fn test_parse_backend_processing_status() {
        let json = r#"{
            "status": "PROCESSING",
            "jobId": "9a4f7c1e-0000-4000-8000-000000000000",
            "startedAt": "2026-01-18T10:15:00.123"
        }"#;

        let status: JobStatus = serde_json::from_str(json).unwrap();
        assert!(matches!(status, JobStatus::Running { started_at: Some(_) }));
        assert_eq!(status.label(), "running");
    }

    #[test]
    fn test_parse_failed_with_message() {
        let status: JobStatus =
            serde_json::from_str(r#"{"status":"failed","message":"scraper crashed"}"#).unwrap();
        assert_eq!(
            status,
            JobStatus::Failed {
                message: Some("scraper crashed".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<JobStatus>(r#"{"status":"exploded"}"#).is_err());
        assert!(serde_json::from_str::<JobStatus>(r#"{"minutesUntilNextUpdate":3}"#).is_err());
    }

    #[test]
    fn test_parse_news_page() {
        let json = r#"{
            "_embedded": {
                "textSentimentList": [
                    {"id": 1, "title": "BTC rallies", "label": "POSITIVE", "score": 0.91},
                    {"id": 2, "title": "ETH flat", "link": "https://example.com/eth"}
                ]
            },
            "_links": {}
        }"#;

        let page: NewsPage = serde_json::from_str(json).unwrap();
        let articles = page.embedded.unwrap().text_sentiment_list;
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].sentiment(), "positive");
        assert_eq!(articles[1].sentiment(), "neutral");
    }
}
