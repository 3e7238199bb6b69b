// mastodon-to-bluesky: move a Mastodon posting history onto Bluesky.
//
// This is the library root. The transfer pipeline lives in `pipeline`;
// the two services are reached through the traits in `mastodon::traits`
// and `bluesky::traits` so the pipeline can run against fakes in tests.

pub mod bluesky;
pub mod config;
pub mod error;
pub mod mastodon;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod status;
