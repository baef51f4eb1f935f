//! Saving URLs and editing their labels.
//!
//! A save is content addressed: the compound hash of the scraped metadata picks
//! the `urls` row (reused when identical, created otherwise), while the narrow
//! URL hash counts how many distinct snapshots exist for the same link.

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::{AddedUrl, Urls};
