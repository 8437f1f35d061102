// Library root
// -----------
// This crate exposes the pieces of the upload client so the binary stays
// a thin shell and the workflow can be driven from tests.
//
// Module responsibilities:
// - `api`: HTTP calls against the media service (login, raw upload,
//   transcode, job status, delete) and the `MediaService` seam.
// - `error`: typed errors for those calls.
// - `workflow`: the login → upload → transcode → cleanup sequence.
// - `cli`: command line parsing and runtime settings.
pub mod api;
pub mod cli;
pub mod error;
pub mod workflow;
