use crate::client::{ClientError, JobStatusClient};
use crate::core::models::{JobStatus, NewsArticle, NewsPage, RateLimitBody, StartOutcome};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

const UPDATE_PATH: &str = "/api/sentiment/update";
const STATUS_PATH: &str = "/api/sentiment/status";
const NEWS_PATH: &str = "/api/sentiment";

pub struct HttpJobClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Latest scored articles for `symbol`, newest first.
    pub async fn fetch_news(
        &self,
        symbol: &str,
        size: u32,
    ) -> Result<Vec<NewsArticle>, ClientError> {
        let url = self.url(NEWS_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_uppercase()),
                ("size", size.to_string()),
            ])
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus {
                url,
                status: response.status(),
            });
        }

        let page: NewsPage = decode(&url, response).await?;
        Ok(page
            .embedded
            .map(|e| e.text_sentiment_list)
            .unwrap_or_default())
    }
}

async fn decode<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let body = response
        .bytes()
        .await
        .map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

    serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}

#[async_trait]
impl JobStatusClient for HttpJobClient {
    async fn start_update(&self) -> Result<StartOutcome, ClientError> {
        let url = self.url(UPDATE_PATH);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(StartOutcome::Accepted),
            StatusCode::TOO_MANY_REQUESTS => {
                let body: RateLimitBody = decode(&url, response).await?;
                Ok(StartOutcome::RateLimited {
                    minutes: body.minutes_until_next_update,
                })
            }
            status => Err(ClientError::UnexpectedStatus { url, status }),
        }
    }

    async fn fetch_status(&self) -> Result<JobStatus, ClientError> {
        let url = self.url(STATUS_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus {
                url,
                status: response.status(),
            });
        }

        decode(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single request with `status_line` and `body`, returning the
    /// base URL to point the client at.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{addr}")
    }

    async fn client_for(status_line: &'static str, body: &'static str) -> HttpJobClient {
        let base = serve_once(status_line, body).await;
        HttpJobClient::new(&base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_start_accepted() {
        let client = client_for("202 Accepted", "").await;
        assert_eq!(client.start_update().await.unwrap(), StartOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_start_rate_limited_reads_minutes() {
        let client = client_for("429 Too Many Requests", r#"{"minutesUntilNextUpdate":7}"#).await;
        assert_eq!(
            client.start_update().await.unwrap(),
            StartOutcome::RateLimited { minutes: 7 }
        );
    }

    #[tokio::test]
    async fn test_start_rate_limited_without_body_is_decode_error() {
        let client = client_for("429 Too Many Requests", "slow down").await;
        let err = client.start_update().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_start_ok_is_unexpected() {
        let client = client_for("200 OK", "{}").await;
        let err = client.start_update().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status: StatusCode::OK, .. }
        ));
    }

    #[tokio::test]
    async fn test_start_server_error_is_unexpected() {
        let client = client_for("500 Internal Server Error", "").await;
        let err = client.start_update().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_status_parses_running() {
        let client = client_for("200 OK", r#"{"status":"running","startedAt":"10:15"}"#).await;
        assert_eq!(
            client.fetch_status().await.unwrap(),
            JobStatus::Running {
                started_at: Some("10:15".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_status_error_code() {
        let client = client_for("503 Service Unavailable", "").await;
        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus {
                status: StatusCode::SERVICE_UNAVAILABLE,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_status_garbage_is_decode_error() {
        let client = client_for("200 OK", "<html>oops</html>").await;
        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_fetch_news_reads_embedded_list() {
        let client = client_for(
            "200 OK",
            r#"{"_embedded":{"textSentimentList":[{"title":"BTC up","label":"POSITIVE"}]}}"#,
        )
        .await;
        let articles = client.fetch_news("btc", 9).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "BTC up");
        assert_eq!(articles[0].sentiment(), "positive");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            HttpJobClient::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(
            client.url(STATUS_PATH),
            "http://localhost:8080/api/sentiment/status"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let client = HttpJobClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }
}
