//! Simulation and reconstruction flows built on the poll controller.

use tokio_util::sync::CancellationToken;

use crate::api::{KomaApi, SimulationRequest};
use crate::error::ClientError;
use crate::poller::{Job, JobPoller, JobSpec, PollConfig};
use crate::session::Session;

/// Run a simulation to completion. The job id is persisted as soon as
/// the backend accepts the job so a later reconstruction can find it.
pub async fn simulate(
    api: &KomaApi,
    session: &mut Session,
    request: &SimulationRequest,
    config: PollConfig,
    cancel: &CancellationToken,
) -> Result<Job, ClientError> {
    let poller = JobPoller::new(api, config);
    let spec = JobSpec::simulation(request)?;
    let mut job = poller.submit(spec, &mut session.panel).await?;

    if let Some(id) = job.id() {
        session.set_job_id(&id)?;
        tracing::info!(job_id = %id, "Simulation submitted");
    }

    poller.run(&mut job, &mut session.panel, cancel).await?;
    session.persist_panel_modes()?;
    Ok(job)
}

/// Reconstruct the output of `job_id`, or of the last stored simulation
/// job when none is given.
pub async fn reconstruct(
    api: &KomaApi,
    session: &mut Session,
    job_id: Option<&str>,
    config: PollConfig,
    cancel: &CancellationToken,
) -> Result<Job, ClientError> {
    let job_id = match job_id {
        Some(id) => id.to_string(),
        None => session.job_id().ok_or_else(|| {
            koma_core::error::CoreError::Validation("no simulation job to reconstruct".into())
        })?,
    };

    let poller = JobPoller::new(api, config);
    let (job, _) = poller
        .submit_and_wait(JobSpec::reconstruction(&job_id), &mut session.panel, cancel)
        .await?;
    session.persist_panel_modes()?;
    tracing::info!(job_id = %job_id, polls = job.polls, "Reconstruction finished");
    Ok(job)
}
