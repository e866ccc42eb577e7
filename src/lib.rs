//! Face search verification service
//!
//! Downloads an image from a caller-supplied URL, submits it to the FaceCheck.ID
//! API, extracts the search id from whichever response shape the API returns,
//! and polls for match results under a bounded deadline.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
