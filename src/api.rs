// API client module: a small blocking HTTP client for the media service.
// It covers the five calls the upload workflow needs (login, raw upload,
// start transcode, job status, delete raw upload) and nothing else.

use crate::error::ApiError;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Bearer credential issued by the login endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

/// Server-assigned key of a raw upload, e.g. `upload/<uuid>.mp4`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

/// Identifier of a transcoding job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

macro_rules! string_newtype {
    ($($name:ident),*) => {$(
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                $name(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    )*};
}

string_newtype!(SessionToken, FileKey, JobId);

/// Output renditions the transcoder knows how to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum Resolution {
    #[serde(rename = "1080p")]
    #[value(name = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    #[value(name = "720p")]
    P720,
    #[serde(rename = "480p")]
    #[value(name = "480p")]
    P480,
    #[serde(rename = "360p")]
    #[value(name = "360p")]
    P360,
    #[serde(rename = "240p")]
    #[value(name = "240p")]
    P240,
    #[serde(rename = "180p")]
    #[value(name = "180p")]
    P180,
}

/// Renditions requested when the caller does not pick any.
pub const DEFAULT_RESOLUTIONS: [Resolution; 2] = [Resolution::P480, Resolution::P360];

/// Knobs for a transcoding request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    pub resolutions: Vec<Resolution>,
    /// `Some(false)` for inputs without an audio stream. `None` leaves the
    /// field out and the service assumes audio is present.
    pub has_audio: Option<bool>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            resolutions: DEFAULT_RESOLUTIONS.to_vec(),
            has_audio: None,
        }
    }
}

/// State of a transcoding job as seen by the client.
///
/// `Complete` carries the manifest path, so a manifest exists exactly when
/// the job completed. Statuses the client does not know about are kept
/// verbatim in `Other`; `Exception` is produced locally when the status
/// request itself failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Progressing,
    Complete { manifest: String },
    Other(String),
    Exception,
}

impl JobStatus {
    /// Whether the job may still change state.
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Submitted | JobStatus::Progressing)
    }

    pub fn manifest(&self) -> Option<&str> {
        match self {
            JobStatus::Complete { manifest } => Some(manifest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Submitted => "Submitted",
            JobStatus::Progressing => "Progressing",
            JobStatus::Complete { .. } => "Complete",
            JobStatus::Other(raw) => raw,
            JobStatus::Exception => "Exception",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login request payload.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of `POST /api/upload/encode`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EncodeRequest<'a> {
    pub input: &'a FileKey,
    pub resolutions: &'a [Resolution],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_audio: Option<bool>,
}

/// Body of `DELETE /api/upload/raw`.
#[derive(Serialize, Debug)]
pub struct DeleteRequest<'a> {
    pub key: &'a FileKey,
}

// Response shapes. The service also sends `status: "OK"` on every success,
// which we do not need.

#[derive(Deserialize, Debug)]
pub struct LoginResponse {
    pub token: SessionToken,
}

#[derive(Deserialize, Debug)]
pub struct UploadResponse {
    pub name: FileKey,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EncodeResponse {
    pub job_id: JobId,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_status: String,
    #[serde(default)]
    pub manifest: Option<String>,
}

/// The remote operations the upload workflow is written against.
/// [`ApiClient`] is the HTTP implementation; tests substitute their own.
pub trait MediaService {
    fn login(&self, username: &str, password: &str) -> Result<SessionToken, ApiError>;

    /// Store the bearer token used by every call below.
    fn set_token(&mut self, token: SessionToken);

    fn upload(&self, file_path: &Path) -> Result<FileKey, ApiError>;

    fn start_transcode(&self, input: &FileKey, options: &EncodeOptions) -> Result<JobId, ApiError>;

    fn job_status(&self, job_id: &JobId) -> Result<JobStatus, ApiError>;

    fn delete_upload(&self, key: &FileKey) -> Result<(), ApiError>;

    /// Like [`MediaService::job_status`], but a failed request becomes
    /// [`JobStatus::Exception`] instead of an error.
    fn poll_status(&self, job_id: &JobId) -> JobStatus {
        self.job_status(job_id).unwrap_or_else(|e| {
            warn!(job_id = %job_id, error = %e, "status request failed");
            JobStatus::Exception
        })
    }
}

/// Blocking client holding the reqwest client, the service host and the
/// bearer token once logged in.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<SessionToken>,
}

impl ApiClient {
    /// Create a client for `host`, e.g. `http://localhost:3000`.
    /// `timeout` bounds each request; `None` waits indefinitely.
    pub fn new(host: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let base_url =
            Url::parse(host).with_context(|| format!("Invalid host URL: {}", host))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid host URL: {}", host);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url,
            token: None,
        })
    }

    /// Resolve an absolute API path against the host. Any path already in
    /// the host is replaced: `http://h/media` + `/api/login` is
    /// `http://h/api/login`.
    fn endpoint(&self, path: &str) -> Result<String, ApiError> {
        self.base_url
            .join(path)
            .map(String::from)
            .map_err(|source| ApiError::InvalidUrl {
                path: path.to_string(),
                source,
            })
    }

    /// Attach the bearer token, or refuse if login has not happened yet.
    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_ref().ok_or(ApiError::NotAuthenticated)?;
        Ok(req.bearer_auth(token.as_str()))
    }

    /// Send a request and turn any non-2xx answer into `ApiError::Status`.
    /// The body of a failed response is kept for diagnostics only.
    fn send(&self, url: &str, req: RequestBuilder) -> Result<Response, ApiError> {
        let res = req.send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = res.status();
        debug!(url, %status, "response received");
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(res)
    }
}

fn read_json<T: DeserializeOwned>(url: &str, res: Response) -> Result<T, ApiError> {
    let text = res.text().map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ApiError::Parse {
        url: url.to_string(),
        source,
    })
}

impl MediaService for ApiClient {
    fn login(&self, username: &str, password: &str) -> Result<SessionToken, ApiError> {
        let url = self.endpoint("/api/login")?;
        debug!(%url, username, "logging in");
        let req = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password });
        let res = self.send(&url, req)?;
        let body: LoginResponse = read_json(&url, res)?;
        Ok(body.token)
    }

    fn set_token(&mut self, token: SessionToken) {
        self.token = Some(token);
    }

    /// Upload a file as multipart/form-data under the field `file`. The
    /// file handle lives in the request body and is closed with it.
    fn upload(&self, file_path: &Path) -> Result<FileKey, ApiError> {
        let url = self.endpoint("/api/upload/raw")?;

        let local_err = |source| ApiError::File {
            path: file_path.to_path_buf(),
            source,
        };
        let file = File::open(file_path).map_err(local_err)?;
        let len = file.metadata().map_err(local_err)?.len();
        let file_name = file_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        debug!(%url, file = %file_path.display(), bytes = len, "uploading");

        let part = multipart::Part::reader_with_length(file, len).file_name(file_name);
        let form = multipart::Form::new().part("file", part);

        let req = self.authorized(self.client.post(&url).multipart(form))?;
        let res = self.send(&url, req)?;
        let body: UploadResponse = read_json(&url, res)?;
        Ok(body.name)
    }

    fn start_transcode(&self, input: &FileKey, options: &EncodeOptions) -> Result<JobId, ApiError> {
        let url = self.endpoint("/api/upload/encode")?;
        let payload = EncodeRequest {
            input,
            resolutions: &options.resolutions,
            has_audio: options.has_audio,
        };
        debug!(%url, ?payload, "starting transcode");
        let req = self.authorized(self.client.post(&url).json(&payload))?;
        let res = self.send(&url, req)?;
        let body: EncodeResponse = read_json(&url, res)?;
        Ok(body.job_id)
    }

    fn job_status(&self, job_id: &JobId) -> Result<JobStatus, ApiError> {
        let url = self.endpoint(&format!("/api/upload/encode/status/{}", job_id))?;
        let req = self.authorized(self.client.get(&url))?;
        let res = self.send(&url, req)?;
        let body: StatusResponse = read_json(&url, res)?;

        match body.job_status.as_str() {
            "Submitted" => Ok(JobStatus::Submitted),
            "Progressing" => Ok(JobStatus::Progressing),
            "Complete" => body
                .manifest
                .map(|manifest| JobStatus::Complete { manifest })
                .ok_or(ApiError::MissingField {
                    url,
                    field: "manifest",
                }),
            _ => Ok(JobStatus::Other(body.job_status)),
        }
    }

    fn delete_upload(&self, key: &FileKey) -> Result<(), ApiError> {
        let url = self.endpoint("/api/upload/raw")?;
        debug!(%url, key = %key, "deleting raw upload");
        let req = self.authorized(self.client.delete(&url).json(&DeleteRequest { key }))?;
        self.send(&url, req)?;
        Ok(())
    }
}
