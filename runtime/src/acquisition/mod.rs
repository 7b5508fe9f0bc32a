//! HTTP acquisition of the stylesheets harvested templates reference.

pub mod assets;
pub mod http_client;

pub use assets::{fetch_all, FetchedAsset};
pub use http_client::HttpClient;
