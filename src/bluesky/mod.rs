// Bluesky client - session auth, blob upload, post creation, rich text.
//
// Built on reqwest with atrium-api response types. `traits` defines what
// the pipeline needs from a destination; `client` implements it over XRPC.

pub mod client;
pub mod richtext;
pub mod traits;
