#![doc = "The `tasknest` library crate."]
#![doc = ""]
#![doc = "This crate contains the domain models, session-backed authentication,"]
#![doc = "request validation pipeline, storage backends, routing configuration, and"]
#![doc = "error handling for the TaskNest API. It is used by the main binary"]
#![doc = "(`main.rs`) to construct and run the application, and by the integration"]
#![doc = "tests to assemble the same application over an in-memory store."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
pub mod validation;
