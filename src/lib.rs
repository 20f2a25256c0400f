/// HTTP application wiring
pub mod app;
/// Administrator authentication
pub mod auth;
/// REST clients for outside services
pub mod client;
/// Controllers for REST endpoints
pub mod controller;
/// Activation codes
pub mod crypto;
/// Submission delivery, activation emails and the queue worker
pub mod delivery;
/// Domain objects
pub mod domain;
pub mod error;
/// Stored records and their state transitions
pub mod model;
/// Repositories
pub mod repo;
/// Application settings
pub mod settings;
/// Application telemetry for tracing and logging
pub mod telemetry;
/// Email templates
pub mod templates;
