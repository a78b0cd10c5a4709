use crate::{
    error::FetchError,
    stats::{
        DocumentFormat,
        RawStatsDocument,
    },
};
use bindstats_config::BindEndpoint;
use reqwest::{
    header::CONTENT_TYPE,
    Client as HttpClient,
};
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};

/// Retrieves one statistics document per call.
pub trait Fetch: Send + Sync {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<RawStatsDocument, FetchError>> + Send + '_>>;

    /// Where the statistics come from, for log messages.
    fn describe(&self) -> String;
}

/// Fetches the statistics channel over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: HttpClient,
    url: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(endpoint: &BindEndpoint) -> eyre::Result<Self> {
        Self::with_url(endpoint.url(), endpoint.timeout())
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> eyre::Result<Self> {
        let http_client = HttpClient::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
        })
    }

    async fn get(&self) -> Result<RawStatsDocument, FetchError> {
        let response = self.http_client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        let format = DocumentFormat::classify(content_type.as_deref(), &body).ok_or_else(|| {
            FetchError::MalformedResponse(format!(
                "neither XML nor JSON (content type {})",
                content_type.as_deref().unwrap_or("unset")
            ))
        })?;
        debug!(url = %self.url, ?format, bytes = body.len(), "Fetched statistics");

        Ok(RawStatsDocument::new(body.to_vec(), format))
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<RawStatsDocument, FetchError>> + Send + '_>> {
        Box::pin(async move {
            // The client timeout covers the whole exchange; this one also bounds
            // a server that trickles the body.
            match tokio::time::timeout(self.timeout, self.get()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            }
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
