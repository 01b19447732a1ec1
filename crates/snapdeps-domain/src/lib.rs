#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod paths;
pub mod search_path;
pub mod settings;

pub use paths::expand_user;
pub use search_path::SearchPath;
pub use settings::{default_config_path, Settings};
