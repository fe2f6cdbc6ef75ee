use crate::error::ProviderError;
use crate::model::{GenerationResult, ProviderKind, QueryParams, DEFAULT_PROVIDER_MODEL};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const USER_AGENT: &str = concat!("llm-esm/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub user_agent: &'static str,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("{0}")]
    Network(String),
    /// The response arrived but its body could not be read.
    #[error("{0}")]
    Body(String),
}

/// Performs one upstream GET.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// `reqwest` transport with a per-call time budget.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let resp = self
            .client
            .get(request.url)
            .header(reqwest::header::USER_AGENT, request.user_agent)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Network(e.to_string())
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        Ok(TransportResponse { status, body })
    }
}

/// Client for one upstream text-generation endpoint.
pub struct ProviderClient {
    kind: ProviderKind,
    base_url: Url,
    transport: Arc<dyn Transport>,
}

impl ProviderClient {
    pub fn new(kind: ProviderKind, base_url: Url, transport: Arc<dyn Transport>) -> Self {
        Self {
            kind,
            base_url,
            transport,
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &QueryParams,
    ) -> Result<GenerationResult, ProviderError> {
        let url = self.request_url(prompt, options)?;
        debug!(provider = %self.kind, model = %options.model, "Calling upstream provider");

        let resp = self
            .transport
            .perform(TransportRequest {
                url,
                user_agent: USER_AGENT,
            })
            .await
            .map_err(|e| match e {
                TransportError::Network(message) => ProviderError::Network {
                    provider: self.kind,
                    message,
                },
                TransportError::Body(message) => ProviderError::InvalidResponse {
                    provider: self.kind,
                    message,
                },
            })?;

        if !(200..300).contains(&resp.status) {
            return Err(ProviderError::UpstreamStatus {
                provider: self.kind,
                status: resp.status,
            });
        }

        let content = resp.body.trim();
        if content.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: self.kind,
                message: "empty body".to_string(),
            });
        }

        Ok(GenerationResult {
            content: content.to_string(),
            provider: self.kind,
        })
    }

    fn request_url(&self, prompt: &str, options: &QueryParams) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidResponse {
                provider: self.kind,
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .push(prompt);

        let model = if options.model.is_empty() {
            DEFAULT_PROVIDER_MODEL
        } else {
            options.model.as_str()
        };
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("model", model);
            if let Some(seed) = options.seed.as_deref().filter(|s| !s.is_empty()) {
                query.append_pair("seed", seed);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replies with a fixed outcome and records every request it was given.
    pub struct FakeTransport {
        reply: Result<(u16, String), String>,
        pub calls: AtomicUsize,
        pub urls: Mutex<Vec<Url>>,
        pub user_agents: Mutex<Vec<&'static str>>,
    }

    impl FakeTransport {
        pub fn ok(body: &str) -> Arc<Self> {
            Self::status(200, body)
        }

        pub fn status(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok((status, body.to_string())),
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
                user_agents: Mutex::new(Vec::new()),
            })
        }

        pub fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection refused".to_string()),
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
                user_agents: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn perform(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.user_agents.lock().unwrap().push(request.user_agent);
            self.urls.lock().unwrap().push(request.url);
            match &self.reply {
                Ok((status, body)) => Ok(TransportResponse {
                    status: *status,
                    body: body.clone(),
                }),
                Err(message) => Err(TransportError::Network(message.clone())),
            }
        }
    }

    pub fn client(kind: ProviderKind, transport: Arc<FakeTransport>) -> ProviderClient {
        ProviderClient::new(
            kind,
            Url::parse("https://text.example.test").unwrap(),
            transport,
        )
    }

    /// Local upstream on an ephemeral port.
    ///
    /// `/ok/*` echoes the request's User-Agent, `/fail/*` answers 503 and
    /// `/slow/*` answers after two seconds. Returns the server root.
    pub async fn spawn_upstream() -> Url {
        use axum::{http::HeaderMap, http::StatusCode, routing::get, Router};

        async fn echo_user_agent(headers: HeaderMap) -> String {
            headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        }

        async fn unavailable() -> (StatusCode, &'static str) {
            (StatusCode::SERVICE_UNAVAILABLE, "busy")
        }

        async fn slow() -> &'static str {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "export const late = true;"
        }

        let app = Router::new()
            .route("/ok/:prompt", get(echo_user_agent))
            .route("/fail/:prompt", get(unavailable))
            .route("/slow/:prompt", get(slow));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }
}
