//! HTTP API handlers for studybank-api

pub mod auth;
pub mod downloads;
pub mod error;
pub mod health;
pub mod studies;
pub mod submissions;
pub mod ui;

pub use downloads::{download_all_tests_zip, download_single_test_type};
pub use error::ApiError;
pub use health::health_routes;
pub use studies::{
    create_studies_from_list, create_studies_from_upload, download_studies_csv, get_study,
};
pub use submissions::submit_test;
pub use ui::{admin_page, root};
