// Command line surface. Four positionals select the service and the file;
// the options tune the transcode request and the polling loop, each with an
// environment variable fallback. Options are only recognised before the
// host: from there on every argument is a plain value.

use crate::api::{EncodeOptions, Resolution, DEFAULT_RESOLUTIONS};
use crate::workflow::{RunRequest, WorkflowSettings};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Upload a file to the media service, transcode videos and clean up the original",
    override_usage = "media-upload-cli [OPTIONS] <HOST> <USERNAME> <PASSWORD> <FILE>",
    after_help = "Options go before HOST. Everything from HOST on is taken literally, \
                  so passwords and file names may start with '-'. \
                  `.mov` and `.mp4` files are transcoded; arguments after FILE are ignored."
)]
pub struct Cli {
    /// HOST USERNAME PASSWORD FILE, then anything else (ignored).
    #[arg(
        value_name = "HOST USERNAME PASSWORD FILE",
        required = true,
        num_args = 4..,
        allow_hyphen_values = true,
        trailing_var_arg = true
    )]
    positionals: Vec<String>,

    /// Renditions to generate for videos.
    #[arg(
        long = "resolution",
        value_enum,
        value_delimiter = ',',
        env = "MEDIA_RESOLUTIONS",
        action = ArgAction::Append
    )]
    pub resolutions: Vec<Resolution>,

    /// The input has no audio stream.
    #[arg(long)]
    pub no_audio: bool,

    /// Pause between two job status requests.
    #[arg(long, env = "MEDIA_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Stop waiting for the job after this many status requests.
    #[arg(long, env = "MEDIA_MAX_POLLS", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_polls: Option<u32>,

    /// Per-request timeout. Requests wait indefinitely when unset.
    #[arg(long, env = "MEDIA_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Do not draw a spinner on stderr.
    #[arg(long)]
    pub no_progress: bool,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    // clap guarantees at least four positionals.
    pub fn host(&self) -> &str {
        &self.positionals[0]
    }

    pub fn username(&self) -> &str {
        &self.positionals[1]
    }

    pub fn password(&self) -> &str {
        &self.positionals[2]
    }

    pub fn file(&self) -> PathBuf {
        PathBuf::from(&self.positionals[3])
    }

    /// Positionals after the file.
    pub fn ignored(&self) -> &[String] {
        &self.positionals[4..]
    }

    pub fn run_request(&self) -> RunRequest {
        RunRequest {
            username: self.username().to_string(),
            password: self.password().to_string(),
            file_path: self.file(),
        }
    }

    pub fn settings(&self) -> WorkflowSettings {
        let resolutions = if self.resolutions.is_empty() {
            DEFAULT_RESOLUTIONS.to_vec()
        } else {
            self.resolutions.clone()
        };
        WorkflowSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_polls: self.max_polls,
            encode: EncodeOptions {
                resolutions,
                has_audio: self.no_audio.then_some(false),
            },
            progress: !self.no_progress,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Default tracing filter when RUST_LOG is not set.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "warn,media_upload_cli=info",
            _ => "warn,media_upload_cli=debug",
        }
    }
}

/// Usage line printed when the arguments cannot be parsed.
pub fn usage(program: &str) -> String {
    format!("USAGE: {} host username password file", program)
}

/// What to do with a clap parse error: help and version are not failures.
pub fn is_informational(err: &clap::Error) -> bool {
    matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}
