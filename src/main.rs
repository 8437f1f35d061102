// Entrypoint for the upload client.
// - Parses arguments, sets up logging, builds the API client and hands it
//   to the workflow.
// - The exit code is 0 when the workflow ran to its end, 1 otherwise.

use clap::Parser;
use media_upload_cli::{api::ApiClient, cli, cli::Cli, workflow};
use std::io;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) if cli::is_informational(&e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let program = std::env::args()
                .next()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").into());
            println!("{}", cli::usage(&program));
            eprintln!("{}", e.render());
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr so stdout only carries the progress lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .with_writer(io::stderr)
        .init();

    if !args.ignored().is_empty() {
        debug!(count = args.ignored().len(), "ignoring arguments after the file");
    }

    let mut api = match ApiClient::new(args.host(), args.timeout()) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    match workflow::run(&mut api, &args.run_request(), &args.settings(), &mut stdout) {
        Ok(outcome) => ExitCode::from(outcome.exit_status()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
