//! Profiles, follows, likes and the fan-out feed.
//!
//! Every save is copied into the author's feed and into the feed of each
//! follower at save time, so reading a feed is a single indexed range scan.

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::{FeedPage, FeedQuery, FeedSource, LikeStatus, LikeToggle, Social};
