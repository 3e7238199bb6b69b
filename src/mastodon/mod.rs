// Mastodon API client - the read-only source side of a transfer.
//
// `traits` defines what the pipeline needs from a source, `client` is the
// REST implementation and `models` holds the raw API records.

pub mod client;
pub mod models;
pub mod traits;
