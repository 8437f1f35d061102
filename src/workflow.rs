// Workflow layer: the fixed upload sequence. Log in, upload, optionally
// transcode and wait for the job, then delete the raw upload. Progress lines
// go to the supplied writer (stdout in the binary) so tests can capture them.

use crate::api::{EncodeOptions, JobId, JobStatus, MediaService};
use crate::error::ApiError;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Extensions that get a transcoding job after upload.
pub const TRANSCODE_EXTENSIONS: [&str; 2] = ["mov", "mp4"];

/// Who is uploading what.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub username: String,
    pub password: String,
    pub file_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    pub poll_interval: Duration,
    /// `None` polls until the job leaves Submitted/Progressing, however long
    /// that takes.
    pub max_polls: Option<u32>,
    pub encode: EncodeOptions,
    /// Show a spinner on stderr while waiting.
    pub progress: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        WorkflowSettings {
            poll_interval: Duration::from_secs(1),
            max_polls: None,
            encode: EncodeOptions::default(),
            progress: true,
        }
    }
}

/// The steps whose failure ends the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Login,
    Upload,
    StartTranscode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Reached the end, whatever the job or delete result was.
    Completed,
    Aborted(Step),
}

impl Outcome {
    pub fn exit_status(&self) -> u8 {
        match self {
            Outcome::Completed => 0,
            Outcome::Aborted(_) => 1,
        }
    }
}

/// How polling ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult {
    Settled { status: JobStatus, polls: u32 },
    GaveUp { last: JobStatus, polls: u32 },
}

/// Whether the file at `path` is a video the service should transcode.
pub fn should_transcode(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TRANSCODE_EXTENSIONS.contains(&ext))
}

fn spinner(enabled: bool, message: &'static str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Poll the job until it is no longer running, printing each status.
///
/// `sleep` is called with the poll interval between two polls, never after
/// the last one.
pub fn poll_until_settled<S, W, F>(
    service: &S,
    job_id: &JobId,
    settings: &WorkflowSettings,
    out: &mut W,
    mut sleep: F,
) -> Result<PollResult>
where
    S: MediaService + ?Sized,
    W: Write,
    F: FnMut(Duration),
{
    let mut polls = 0u32;
    loop {
        let status = service.poll_status(job_id);
        polls += 1;
        writeln!(out, "Job status: {}", status)?;

        if !status.is_running() {
            return Ok(PollResult::Settled { status, polls });
        }
        if settings.max_polls.is_some_and(|max| polls >= max) {
            warn!(job_id = %job_id, polls, "giving up on job");
            return Ok(PollResult::GaveUp { last: status, polls });
        }

        sleep(settings.poll_interval);
    }
}

/// Run the whole sequence with a real sleep between polls.
pub fn run<S, W>(
    service: &mut S,
    request: &RunRequest,
    settings: &WorkflowSettings,
    out: &mut W,
) -> Result<Outcome>
where
    S: MediaService + ?Sized,
    W: Write,
{
    run_with_sleep(service, request, settings, out, thread::sleep)
}

/// Same as [`run`], with the pause between status polls supplied by the caller.
pub fn run_with_sleep<S, W, F>(
    service: &mut S,
    request: &RunRequest,
    settings: &WorkflowSettings,
    out: &mut W,
    sleep: F,
) -> Result<Outcome>
where
    S: MediaService + ?Sized,
    W: Write,
    F: FnMut(Duration),
{
    let token = match service.login(&request.username, &request.password) {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "login failed");
            writeln!(out, "Login invalid")?;
            return Ok(Outcome::Aborted(Step::Login));
        }
    };
    service.set_token(token);
    writeln!(out, "Login successful")?;

    let pb = spinner(settings.progress, "Uploading...");
    let uploaded = service.upload(&request.file_path);
    pb.finish_and_clear();
    let key = match uploaded {
        Ok(key) => key,
        Err(e @ ApiError::File { .. }) => {
            return Err(e).context("Upload aborted");
        }
        Err(e) => {
            warn!(error = %e, "upload failed");
            writeln!(out, "Upload failed")?;
            return Ok(Outcome::Aborted(Step::Upload));
        }
    };
    info!(key = %key, "file uploaded");
    writeln!(out, "File uploaded")?;

    if should_transcode(&request.file_path) {
        let job_id = match service.start_transcode(&key, &settings.encode) {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(error = %e, "transcode did not start");
                writeln!(out, "Could not start transcoding job")?;
                return Ok(Outcome::Aborted(Step::StartTranscode));
            }
        };
        info!(job_id = %job_id, "transcoding job started");
        writeln!(out, "Transcoding job started")?;

        let pb = spinner(settings.progress, "Waiting for transcoder...");
        let polled = poll_until_settled(&*service, &job_id, settings, out, sleep);
        pb.finish_and_clear();

        match polled? {
            PollResult::Settled {
                status: JobStatus::Complete { manifest },
                ..
            } => writeln!(out, "Manifest generated at: {}", manifest)?,
            PollResult::Settled { status, .. } => {
                writeln!(out, "Job exited with status: {}", status)?
            }
            PollResult::GaveUp { last, polls } => writeln!(
                out,
                "Gave up waiting for job after {} polls, last status: {}",
                polls, last
            )?,
        }
    } else {
        info!(file = %request.file_path.display(), "not a video, skipping transcode");
    }

    match service.delete_upload(&key) {
        Ok(()) => writeln!(out, "Original file deleted")?,
        Err(e) => {
            warn!(key = %key, error = %e, "delete failed");
            writeln!(out, "Could not delete original file")?;
        }
    }

    Ok(Outcome::Completed)
}
