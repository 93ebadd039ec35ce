// Mastodon API client: response checking, notifications, followers, statuses.
//
// Built on reqwest. Each submodule handles one area of the Mastodon API
// surface; `rate_limit` watches the quota headers every response carries.

pub mod client;
pub mod error;
pub mod followers;
pub mod notifications;
pub mod rate_limit;
pub mod statuses;
pub mod traits;
