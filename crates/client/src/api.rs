//! REST client for the KomaMRI simulation backend.
//!
//! Wraps the backend HTTP API (job submission and status polling, plot
//! rendering, phantom volumes, stored results, logout) using
//! [`reqwest`]. Authenticated calls carry the stored bearer token.

use koma_core::results::ResultSummary;
use koma_core::types::{ResultId, Viewport};
use koma_core::view_state::MapMode;
use reqwest::header::LOCATION;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ErrorBody};

/// HTTP client for one backend deployment.
pub struct KomaApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

/// Status, redirect flag, `Location` header and body text of a response.
///
/// This is the shape the job poll controller reasons about; it does not
/// depend on how the response was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Whether the request was answered through a redirect.
    pub redirected: bool,
    pub location: Option<String>,
    pub body: String,
}

/// Body of `POST /simulate`.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRequest {
    pub sequence: serde_json::Value,
    pub scanner: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phantom: Option<String>,
}

/// Body of `POST /plot_sequence`.
#[derive(Debug, Serialize)]
pub struct SequencePlotRequest<'a> {
    pub scanner: &'a serde_json::Value,
    pub sequence: &'a serde_json::Value,
    pub width: u32,
    pub height: u32,
}

/// Response of `POST /plot_sequence`.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencePlot {
    pub seq_html: String,
    pub kspace_html: String,
}

/// Body of `POST /plot_phantom`.
#[derive(Debug, Serialize)]
pub struct PhantomPlotRequest<'a> {
    pub phantom: &'a str,
    pub map: MapMode,
    pub width: u32,
    pub height: u32,
}

/// Terminal payload of a reconstruction status poll.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconstructionOutput {
    pub image_html: String,
    pub kspace_html: String,
}

impl KomaApi {
    /// Create a client for the backend at `base_url`, e.g.
    /// `http://localhost:8000`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self::with_client(reqwest::Client::new(), parse_base(base_url)?))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a `Location` header value against the base URL.
    pub fn resolve_location(&self, location: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(location)
            .map_err(|e| ClientError::InvalidUrl(format!("{location}: {e}")))
    }

    /// Submit a job payload to `endpoint` and capture the raw answer.
    ///
    /// The status is not interpreted here: the poll controller decides
    /// whether the job was accepted.
    pub async fn submit_job(
        &self,
        endpoint: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<RawResponse, ClientError> {
        let url = self.endpoint(endpoint)?;
        let mut request = self.authorized(self.client.post(url.clone()));
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::capture(response, &url).await
    }

    /// Poll a job status location, passing the viewport so the server
    /// sizes rendered output.
    pub async fn poll_status(
        &self,
        location: &Url,
        viewport: Viewport,
    ) -> Result<RawResponse, ClientError> {
        let mut url = location.clone();
        url.query_pairs_mut()
            .append_pair("width", &viewport.width.to_string())
            .append_pair("height", &viewport.height.to_string());

        let response = self.authorized(self.client.get(url.clone())).send().await?;
        Self::capture(response, &url).await
    }

    /// Render the sequence diagram and its k-space trajectory.
    pub async fn plot_sequence(
        &self,
        request: &SequencePlotRequest<'_>,
    ) -> Result<SequencePlot, ClientError> {
        let response = self
            .authorized(self.client.post(self.endpoint("plot_sequence")?))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Render the interactive 3-D phantom plot as HTML.
    pub async fn plot_phantom(
        &self,
        request: &PhantomPlotRequest<'_>,
    ) -> Result<String, ClientError> {
        let response = self
            .authorized(self.client.post(self.endpoint("plot_phantom")?))
            .json(request)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?)
    }

    /// Download the NIfTI volume of one phantom parameter map.
    pub async fn fetch_volume(&self, phantom: &str, map: MapMode) -> Result<Vec<u8>, ClientError> {
        let mut url = self.endpoint("public")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            for part in phantom.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
            segments.push(&format!("{map}.nii.gz"));
        }

        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// List the user's stored results.
    pub async fn list_results(&self) -> Result<Vec<ResultSummary>, ClientError> {
        let response = self
            .authorized(self.client.get(self.endpoint("api/results")?))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download the archive of one stored result.
    pub async fn download_result(&self, id: ResultId) -> Result<Vec<u8>, ClientError> {
        let response = self
            .authorized(
                self.client
                    .get(self.endpoint(&format!("api/results/{id}/download"))?),
            )
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Delete one stored result.
    pub async fn delete_result(&self, id: ResultId) -> Result<(), ClientError> {
        let response = self
            .authorized(self.client.delete(self.endpoint(&format!("api/results/{id}"))?))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// End the server session. Only a `200` confirms the logout.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self.client.get(self.endpoint("logout")?).send().await?;
        if response.status() != StatusCode::OK {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(())
    }

    // ---- private helpers ----

    /// URL of a backend route relative to the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let path = path.trim_start_matches('/');
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Read a response into a [`RawResponse`]. A final URL different
    /// from the requested one means a redirect was followed.
    async fn capture(response: reqwest::Response, requested: &Url) -> Result<RawResponse, ClientError> {
        let status = response.status().as_u16();
        let redirected = response.url() != requested;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            redirected,
            location,
            body,
        })
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or the backend's declared error.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ErrorBody::into_error(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ClientError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Parse a base URL, making sure relative routes append to its path.
fn parse_base(base_url: &str) -> Result<Url, ClientError> {
    let mut url =
        Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
