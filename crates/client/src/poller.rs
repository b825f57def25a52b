//! Job poll controller.
//!
//! A single state machine drives every long-running backend job:
//! submit the payload, receive a status location (HTTP 202 +
//! `Location`), then poll that location on a flat interval until a
//! terminal response arrives. Simulation and reconstruction differ
//! only in endpoint, payload, signal decoding and how the final body is
//! rendered, all captured by [`JobKind`] and [`JobSpec`].
//!
//! ```text
//! Submitted --202--> Polling --redirect(signal)--> Polling
//!                       |--200--> Succeeded
//!                       |--500 / other / -2 / transport error--> Failed
//! ```

use std::time::Duration;

use async_trait::async_trait;
use koma_core::progress::ProgressSignal;
use koma_core::types::{JobId, Viewport};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::api::{KomaApi, RawResponse, ReconstructionOutput, SimulationRequest};
use crate::error::{ClientError, ErrorBody};
use crate::panel::{
    reconstruction_progress, simulation_progress, JobView, ProgressUpdate, RenderedSurface,
    Surface,
};

/// Delay between two status polls of the same job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Network operations the controller needs from the backend.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Send a job submission and return the raw response.
    async fn submit(
        &self,
        endpoint: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<RawResponse, ClientError>;

    /// Fetch the job status at `location`.
    async fn poll(&self, location: &Url, viewport: Viewport) -> Result<RawResponse, ClientError>;

    /// Turn a `Location` header value into an absolute URL.
    fn resolve_location(&self, location: &str) -> Result<Url, ClientError>;
}

#[async_trait]
impl JobTransport for KomaApi {
    async fn submit(
        &self,
        endpoint: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<RawResponse, ClientError> {
        self.submit_job(endpoint, payload).await
    }

    async fn poll(&self, location: &Url, viewport: Viewport) -> Result<RawResponse, ClientError> {
        self.poll_status(location, viewport).await
    }

    fn resolve_location(&self, location: &str) -> Result<Url, ClientError> {
        KomaApi::resolve_location(self, location)
    }
}

/// The kinds of long-running job the backend offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Simulation,
    Reconstruction,
}

impl JobKind {
    /// Decode the integer carried by a redirected status poll.
    pub fn decode_signal(self, raw: i64) -> Result<ProgressSignal, ClientError> {
        let signal = match self {
            JobKind::Simulation => ProgressSignal::from_simulation(raw)?,
            JobKind::Reconstruction => ProgressSignal::from_reconstruction(raw)?,
        };
        Ok(signal)
    }

    pub fn progress(self, signal: ProgressSignal) -> ProgressUpdate {
        match self {
            JobKind::Simulation => simulation_progress(signal),
            JobKind::Reconstruction => reconstruction_progress(signal),
        }
    }

    /// Surfaces this kind of job renders into.
    pub fn surfaces(self) -> &'static [Surface] {
        match self {
            JobKind::Simulation => &[Surface::SimResult],
            JobKind::Reconstruction => &[Surface::ReconImage, Surface::ReconKspace],
        }
    }

    /// Turn the terminal `200` body into surface contents.
    pub fn render(self, body: &str) -> Result<Vec<RenderedSurface>, ClientError> {
        match self {
            JobKind::Simulation => Ok(vec![RenderedSurface {
                surface: Surface::SimResult,
                html: body.to_string(),
            }]),
            JobKind::Reconstruction => {
                let output: ReconstructionOutput = serde_json::from_str(body)
                    .map_err(|e| ClientError::Decode(format!("reconstruction output: {e}")))?;
                Ok(vec![
                    RenderedSurface {
                        surface: Surface::ReconImage,
                        html: output.image_html,
                    },
                    RenderedSurface {
                        surface: Surface::ReconKspace,
                        html: output.kspace_html,
                    },
                ])
            }
        }
    }
}

/// What to submit, and where.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub kind: JobKind,
    pub endpoint: String,
    pub payload: Option<serde_json::Value>,
}

impl JobSpec {
    /// `POST /simulate` with `{sequence, scanner[, phantom]}`.
    pub fn simulation(request: &SimulationRequest) -> Result<Self, ClientError> {
        let payload = serde_json::to_value(request)
            .map_err(|e| ClientError::Decode(format!("simulation request: {e}")))?;
        Ok(Self {
            kind: JobKind::Simulation,
            endpoint: "simulate".to_string(),
            payload: Some(payload),
        })
    }

    /// `POST /recon/<job_id>` for a finished simulation.
    pub fn reconstruction(job_id: &str) -> Self {
        Self {
            kind: JobKind::Reconstruction,
            endpoint: format!("recon/{job_id}"),
            payload: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// A job accepted by the backend and tracked through its status URL.
#[derive(Debug, Clone)]
pub struct Job {
    pub spec: JobSpec,
    pub status_location: Url,
    pub last_progress: Option<ProgressSignal>,
    pub state: JobState,
    /// Number of status polls issued so far.
    pub polls: u32,
}

impl Job {
    /// Server-side job id: the last path segment of the status location.
    pub fn id(&self) -> Option<JobId> {
        self.status_location
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string)
    }
}

/// Result of one non-failing status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job is still running; poll again.
    Pending(ProgressSignal),
    /// Terminal success with rendered output.
    Succeeded(Vec<RenderedSurface>),
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub viewport: Viewport,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            viewport: Viewport::default(),
        }
    }
}

/// Drives jobs against a [`JobTransport`].
pub struct JobPoller<'a, T: JobTransport + ?Sized> {
    transport: &'a T,
    config: PollConfig,
}

impl<'a, T: JobTransport + ?Sized> JobPoller<'a, T> {
    pub fn new(transport: &'a T, config: PollConfig) -> Self {
        Self { transport, config }
    }

    /// Submit a job. Only `202` with a `Location` header is accepted;
    /// anything else fails without retry.
    pub async fn submit<V: JobView + ?Sized>(
        &self,
        spec: JobSpec,
        view: &mut V,
    ) -> Result<Job, ClientError> {
        view.on_submitted(spec.kind.surfaces());

        let accepted = match self
            .transport
            .submit(&spec.endpoint, spec.payload.as_ref())
            .await
        {
            Ok(response) => self.accept(response),
            Err(e) => Err(e),
        };

        match accepted {
            Ok(status_location) => {
                tracing::info!(
                    endpoint = %spec.endpoint,
                    location = %status_location,
                    "Job accepted",
                );
                Ok(Job {
                    spec,
                    status_location,
                    last_progress: None,
                    state: JobState::Submitted,
                    polls: 0,
                })
            }
            Err(e) => {
                tracing::error!(endpoint = %spec.endpoint, error = %e, "Job submission failed");
                view.on_error(&e.user_message());
                Err(e)
            }
        }
    }

    /// Issue one status poll and apply its outcome to the job and view.
    pub async fn poll<V: JobView + ?Sized>(
        &self,
        job: &mut Job,
        view: &mut V,
    ) -> Result<PollOutcome, ClientError> {
        job.state = JobState::Polling;
        job.polls += 1;

        let outcome = match self
            .transport
            .poll(&job.status_location, self.config.viewport)
            .await
        {
            Ok(response) => interpret(job, response),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(PollOutcome::Pending(signal)) => {
                tracing::debug!(
                    location = %job.status_location,
                    progress = ?signal,
                    "Job still running",
                );
                view.on_progress(&job.spec.kind.progress(signal));
                Ok(PollOutcome::Pending(signal))
            }
            Ok(PollOutcome::Succeeded(surfaces)) => {
                job.state = JobState::Succeeded;
                tracing::info!(location = %job.status_location, polls = job.polls, "Job finished");
                view.on_success(&surfaces);
                Ok(PollOutcome::Succeeded(surfaces))
            }
            Err(e) => {
                job.state = JobState::Failed;
                tracing::error!(
                    location = %job.status_location,
                    polls = job.polls,
                    error = %e,
                    "Job failed",
                );
                view.on_error(&e.user_message());
                Err(e)
            }
        }
    }

    /// Poll until a terminal response, sleeping the configured interval
    /// between polls. There is no retry ceiling and no timeout; the
    /// cancellation token only stops the local chain.
    pub async fn run<V: JobView + ?Sized>(
        &self,
        job: &mut Job,
        view: &mut V,
        cancel: &CancellationToken,
    ) -> Result<Vec<RenderedSurface>, ClientError> {
        loop {
            if let PollOutcome::Succeeded(surfaces) = self.poll(job, view).await? {
                return Ok(surfaces);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(location = %job.status_location, "Polling cancelled");
                    return Err(ClientError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// Submit then poll to completion.
    pub async fn submit_and_wait<V: JobView + ?Sized>(
        &self,
        spec: JobSpec,
        view: &mut V,
        cancel: &CancellationToken,
    ) -> Result<(Job, Vec<RenderedSurface>), ClientError> {
        let mut job = self.submit(spec, view).await?;
        let surfaces = self.run(&mut job, view, cancel).await?;
        Ok((job, surfaces))
    }

    fn accept(&self, response: RawResponse) -> Result<Url, ClientError> {
        if response.status == 202 {
            let location = response.location.ok_or(ClientError::MissingLocation)?;
            return self.transport.resolve_location(&location);
        }
        Err(ErrorBody::into_error(response.status, &response.body))
    }
}

/// Classify one status response.
fn interpret(job: &mut Job, response: RawResponse) -> Result<PollOutcome, ClientError> {
    if response.redirected {
        let raw = parse_signal(&response.body)?;
        let signal = job.spec.kind.decode_signal(raw)?;
        job.last_progress = Some(signal);
        if signal.is_failure() {
            return Err(ClientError::JobFailed);
        }
        return Ok(PollOutcome::Pending(signal));
    }

    match response.status {
        200 => Ok(PollOutcome::Succeeded(job.spec.kind.render(&response.body)?)),
        500 => Err(ErrorBody::into_error(500, &response.body)),
        other => Err(ClientError::UnexpectedStatus(other)),
    }
}

/// The progress body is a bare JSON integer. Integral floats such as
/// `42.0` are accepted, fractions are not.
fn parse_signal(body: &str) -> Result<i64, ClientError> {
    let value: serde_json::Value = serde_json::from_str(body.trim())
        .map_err(|e| ClientError::Decode(format!("progress signal: {e}")))?;
    value
        .as_i64()
        .or_else(|| value.as_f64().and_then(integral))
        .ok_or_else(|| ClientError::Decode(format!("progress signal is not an integer: {value}")))
}

fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}
