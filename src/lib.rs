// Hornbot: a Mastodon bot that sounds the horn for your followers.
//
// This is the library root. `mastodon` wraps the instance API (notifications,
// followers, statuses, rate-limit observation); `bot` holds the polling and
// broadcast logic built on top of it.

pub mod bot;
pub mod config;
pub mod mastodon;
