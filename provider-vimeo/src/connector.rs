//! Vimeo API connector implementation
//!
//! Implements [`CatalogProvider`] for the Vimeo REST API (version 3.4).

use async_trait::async_trait;
use bridge_traits::catalog::{
    CatalogProvider, RemoteContainer, RemoteItem, RemoteItemPage, TextTrack, WebhookRegistration,
    WebhookRegistrationRequest,
};
use bridge_traits::connections::Credential;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use chrono::DateTime;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Result, VimeoError};
use crate::types::{
    VimeoCollection, VimeoErrorBody, VimeoProject, VimeoTextTrack, VimeoVideo, VimeoWebhook,
};
use crate::webvtt::{pick_preferred_track, track_label, webvtt_to_plain_text};

/// Vimeo API base URL
pub const VIMEO_API_BASE: &str = "https://api.vimeo.com";

const VIMEO_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";

const TEXT_TRACK_ACCEPT: &str = "text/vtt, text/plain;q=0.9";

/// Fields requested for video resources
const VIDEO_FIELDS: &str = "uri,name,description,link,created_time,pictures.sizes";

/// `error_code` Vimeo sends with a 400 when the requested page is past the end
const PAGE_OUT_OF_RANGE: i64 = 2286;

/// Equivalent subscription endpoints, tried in order
const WEBHOOK_ENDPOINTS: [&str; 2] = ["/me/webhooks", "/users/me/webhooks"];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct WebhookPayload<'a> {
    url: &'a str,
    events: &'a [String],
}

/// Vimeo API connector
///
/// Stateless apart from the HTTP client; the credential is passed per call
/// so one connector serves every connection.
///
/// # Example
///
/// ```ignore
/// use provider_vimeo::VimeoConnector;
/// use bridge_traits::CatalogProvider;
///
/// let connector = VimeoConnector::new(http_client);
/// let page = connector.list_items(&credential, 1, 100).await?;
/// ```
pub struct VimeoConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    request_timeout: Duration,
}

impl VimeoConnector {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: VIMEO_API_BASE.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point the connector at another host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn api_request(&self, method: HttpMethod, url: String, credential: &Credential) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(credential.access_token())
            .header("Accept", VIMEO_ACCEPT)
            .timeout(self.request_timeout)
    }

    /// Resolve a URI, path or bare webhook id against the API base.
    fn resolve_url(&self, uri_or_url: &str) -> String {
        if uri_or_url.starts_with("http://") || uri_or_url.starts_with("https://") {
            uri_or_url.to_string()
        } else if uri_or_url.starts_with('/') {
            format!("{}{}", self.base_url, uri_or_url)
        } else {
            format!("{}/me/webhooks/{}", self.base_url, uri_or_url)
        }
    }

    /// Same scheme, host and port as the configured API base.
    fn is_api_origin(&self, candidate: &str) -> bool {
        match (Url::parse(&self.base_url), Url::parse(candidate)) {
            (Ok(base), Ok(other)) => base.origin() == other.origin(),
            _ => false,
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.http_client.execute(request).await?)
    }

    fn api_error(response: &HttpResponse) -> VimeoError {
        VimeoError::ApiError {
            status_code: response.status,
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        }
    }

    fn ensure_success(response: HttpResponse) -> Result<HttpResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(Self::api_error(&response))
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body)
            .map_err(|e| VimeoError::ParseError(format!("{}: {}", what, e)))
    }

    /// Epoch milliseconds, 0 when absent or unparsable
    fn parse_timestamp(rfc3339: Option<&str>) -> i64 {
        rfc3339
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    fn convert_video(video: VimeoVideo, external_id: Option<&str>) -> RemoteItem {
        let sizes = video
            .pictures
            .as_ref()
            .map(|p| p.sizes.as_slice())
            .unwrap_or_default();
        let thumbnail_url = sizes
            .last()
            .filter(|s| !s.link.is_empty())
            .or_else(|| sizes.first())
            .map(|s| s.link.clone());

        RemoteItem {
            external_id: external_id
                .map(str::to_string)
                .unwrap_or_else(|| video.uri.replace("/videos/", "")),
            title: video.name.unwrap_or_default(),
            description: video.description,
            embed_url: video.link.unwrap_or_default(),
            thumbnail_url,
            published_at: Self::parse_timestamp(video.created_time.as_deref()),
        }
    }

    #[instrument(skip(self, credential))]
    async fn fetch_page(
        &self,
        credential: &Credential,
        page: u32,
        per_page: u32,
    ) -> Result<RemoteItemPage> {
        let url = format!(
            "{}/me/videos?fields={}&page={}&per_page={}",
            self.base_url,
            urlencoding::encode(VIDEO_FIELDS),
            page,
            per_page
        );

        let response = self
            .send(self.api_request(HttpMethod::Get, url, credential))
            .await?;

        if !response.is_success() {
            if response.status == 400 {
                let body: VimeoErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
                if body.error_code == Some(PAGE_OUT_OF_RANGE) {
                    debug!(page, "Page out of range, pagination exhausted");
                    return Ok(RemoteItemPage {
                        items: Vec::new(),
                        total: body.total,
                        has_more: false,
                    });
                }
            }

            warn!(page, status = response.status, "Failed to fetch Vimeo videos");
            return Err(Self::api_error(&response));
        }

        let collection: VimeoCollection<VimeoVideo> = Self::parse(&response, "videos page")?;
        let has_more = collection
            .paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .is_some();

        let items: Vec<RemoteItem> = collection
            .data
            .into_iter()
            .map(|video| Self::convert_video(video, None))
            .collect();

        debug!(page, count = items.len(), has_more, "Fetched Vimeo videos page");

        Ok(RemoteItemPage {
            items,
            total: collection.total,
            has_more,
        })
    }

    #[instrument(skip(self, credential))]
    async fn fetch_video(&self, credential: &Credential, external_id: &str) -> Result<RemoteItem> {
        let url = format!(
            "{}/videos/{}?fields={}",
            self.base_url,
            urlencoding::encode(external_id),
            urlencoding::encode(VIDEO_FIELDS)
        );

        let response = Self::ensure_success(
            self.send(self.api_request(HttpMethod::Get, url, credential))
                .await?,
        )?;
        let video: VimeoVideo = Self::parse(&response, "video")?;

        Ok(Self::convert_video(video, Some(external_id)))
    }

    async fn fetch_projects(&self, credential: &Credential) -> Result<Vec<RemoteContainer>> {
        let url = format!("{}/me/projects?per_page=100", self.base_url);

        let response = Self::ensure_success(
            self.send(self.api_request(HttpMethod::Get, url, credential))
                .await?,
        )?;
        let collection: VimeoCollection<VimeoProject> = Self::parse(&response, "projects")?;

        Ok(collection
            .data
            .into_iter()
            .map(|project| RemoteContainer {
                id: last_segment(&project.uri).unwrap_or(&project.uri).to_string(),
                name: project.name.unwrap_or_default(),
            })
            .collect())
    }

    /// Try each subscription endpoint until one accepts the request.
    async fn create_webhook(
        &self,
        credential: &Credential,
        request: &WebhookRegistrationRequest,
    ) -> Result<WebhookRegistration> {
        let payload = WebhookPayload {
            url: &request.callback_url,
            events: &request.events,
        };

        let mut last_error: Option<VimeoError> = None;

        for endpoint in WEBHOOK_ENDPOINTS {
            let url = format!("{}{}", self.base_url, endpoint);
            let http_request = self
                .api_request(HttpMethod::Post, url.clone(), credential)
                .json(&payload)?;

            let outcome = match self.send(http_request).await {
                Ok(response) => Self::ensure_success(response),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(response) => {
                    let webhook: VimeoWebhook = serde_json::from_slice(&response.body).unwrap_or_default();
                    let subscription_id = webhook.subscription_id();

                    info!(
                        endpoint,
                        subscription_id = subscription_id.as_deref().unwrap_or("<none>"),
                        "Vimeo webhook registered"
                    );

                    return Ok(WebhookRegistration {
                        subscription_id,
                        endpoint: url,
                    });
                }
                Err(e) => {
                    warn!(endpoint, error = %e, "Webhook endpoint rejected registration");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| VimeoError::ApiError {
            status_code: 0,
            message: "Failed to create Vimeo webhook subscription".to_string(),
        }))
    }

    async fn delete_webhook(&self, credential: &Credential, subscription_id: &str) -> Result<()> {
        let url = self.resolve_url(subscription_id);
        let response = self
            .send(self.api_request(HttpMethod::Delete, url, credential))
            .await?;

        if response.status == 404 {
            debug!(subscription_id, "Webhook already removed");
            return Ok(());
        }

        Self::ensure_success(response)?;
        Ok(())
    }

    #[instrument(skip(self, credential))]
    async fn fetch_text_track(&self, credential: &Credential, external_id: &str) -> Result<TextTrack> {
        let url = format!(
            "{}/videos/{}/texttracks?per_page=100",
            self.base_url,
            urlencoding::encode(external_id)
        );

        let response = Self::ensure_success(
            self.send(self.api_request(HttpMethod::Get, url, credential))
                .await?,
        )?;
        let collection: VimeoCollection<VimeoTextTrack> = Self::parse(&response, "text tracks")?;

        let track = pick_preferred_track(&collection.data).ok_or_else(|| {
            VimeoError::NoTextTracks {
                video_id: external_id.to_string(),
            }
        })?;

        let track_id = last_segment(&track.uri)
            .unwrap_or(external_id)
            .to_string();

        let link = track
            .link
            .as_deref()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| VimeoError::MissingTrackLink {
                track_id: track_id.clone(),
            })?;
        let download_url = if link.starts_with('/') || link.starts_with("http") {
            self.resolve_url(link)
        } else {
            format!("{}/{}", self.base_url, link)
        };

        // Only our own API origin gets the bearer token; CDN links are pre-signed.
        let download = if self.is_api_origin(&download_url) {
            self.api_request(HttpMethod::Get, download_url, credential)
                .header("Accept", TEXT_TRACK_ACCEPT)
        } else {
            HttpRequest::new(HttpMethod::Get, download_url).timeout(self.request_timeout)
        };

        let response = Self::ensure_success(self.send(download).await?)?;
        let raw = String::from_utf8_lossy(&response.body).to_string();
        let plain = webvtt_to_plain_text(&raw);

        Ok(TextTrack {
            track_id,
            label: track_label(track),
            language: track.language.clone(),
            kind: track.kind.clone(),
            content: if plain.is_empty() { raw.clone() } else { plain },
            raw,
        })
    }
}

fn last_segment(uri: &str) -> Option<&str> {
    uri.split('/').filter(|s| !s.is_empty()).last()
}

#[async_trait]
impl CatalogProvider for VimeoConnector {
    async fn list_items(
        &self,
        credential: &Credential,
        page: u32,
        per_page: u32,
    ) -> bridge_traits::error::Result<RemoteItemPage> {
        Ok(self.fetch_page(credential, page, per_page).await?)
    }

    async fn get_item(
        &self,
        credential: &Credential,
        external_id: &str,
    ) -> bridge_traits::error::Result<RemoteItem> {
        Ok(self.fetch_video(credential, external_id).await?)
    }

    async fn list_containers(
        &self,
        credential: &Credential,
    ) -> bridge_traits::error::Result<Vec<RemoteContainer>> {
        Ok(self.fetch_projects(credential).await?)
    }

    async fn register_webhook(
        &self,
        credential: &Credential,
        request: &WebhookRegistrationRequest,
    ) -> bridge_traits::error::Result<WebhookRegistration> {
        Ok(self.create_webhook(credential, request).await?)
    }

    async fn unregister_webhook(
        &self,
        credential: &Credential,
        subscription_id: &str,
    ) -> bridge_traits::error::Result<()> {
        Ok(self.delete_webhook(credential, subscription_id).await?)
    }

    async fn get_text_track(
        &self,
        credential: &Credential,
        external_id: &str,
    ) -> bridge_traits::error::Result<TextTrack> {
        Ok(self.fetch_text_track(credential, external_id).await?)
    }
}
