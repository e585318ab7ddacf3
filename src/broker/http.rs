use reqwest::header::CONTENT_TYPE;

use super::{PublishError, Publisher};
use crate::api::API_KEY_HEADER;

/// Sends batches straight to the backend's `add` route.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpPublisher {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

impl Publisher for HttpPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(PublishError::Http)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        log::debug!("Ingress `{}` accepted batch", self.url);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Option<String>, Vec<u8>)>>>;

    async fn serve(status: StatusCode) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let router = {
            let seen = Arc::clone(&seen);
            axum::Router::new().route(
                "/container/add",
                post(move |headers: HeaderMap, body: axum::body::Bytes| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let key = headers
                            .get(API_KEY_HEADER)
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_owned);
                        seen.lock().unwrap().push((key, body.to_vec()));
                        (status, "done")
                    }
                }),
            )
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        (format!("http://{addr}/container/add"), seen)
    }

    #[tokio::test]
    async fn test_publish_posts_payload_with_key() {
        let (url, seen) = serve(StatusCode::OK).await;
        let publisher = HttpPublisher::new(url, Some("secret".to_owned()));

        publisher.publish(b"{\"containers\":[]}".to_vec()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("secret"));
        assert_eq!(seen[0].1, b"{\"containers\":[]}");
    }

    #[tokio::test]
    async fn test_publish_reports_rejection() {
        let (url, _) = serve(StatusCode::TOO_MANY_REQUESTS).await;
        let publisher = HttpPublisher::new(url, None);

        let err = publisher.publish(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Rejected { status: 429, ref body } if body == "done"
        ));
    }
}
