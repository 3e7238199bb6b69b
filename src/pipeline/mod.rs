// Transfer pipeline: Mastodon post -> Bluesky thread.
//
// normalize -> segment -> media -> thread, driven post by post by
// `transfer`, with `state` recording what has already been moved.

pub mod media;
pub mod normalize;
pub mod segment;
pub mod state;
pub mod thread;
pub mod transfer;
