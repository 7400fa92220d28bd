//! Lead Capture API Library
//!
//! Backend for a real-estate lead-capture form: public submissions are
//! scored, deduplicated per person and day, stored in a document store and
//! announced to an administrator by email. Admin routes manage leads and the
//! form's header/footer content.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Lead and content business logic.
//! - `integrations`: Storage backends and email transport.
//! - `auth`: Admin bearer-token gate.
//! - `config`: Configuration management.
//! - `content`: Header/footer singletons.
//! - `db`: Database connection and schema.
//! - `db_storage`: Postgres document store.
//! - `dedupe`: Same-day duplicate detection.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `leads`: Lead record management.
//! - `mailer`: Email transports.
//! - `models`: Core data models.
//! - `notifications`: Admin notice composition and dispatch.
//! - `scoring`: Lead scoring.
//! - `store`: Document store contract and in-memory backend.
//! - `validation`: Request validation.

pub mod api;
pub mod core;
pub mod integrations;

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod db_storage;
pub mod dedupe;
pub mod errors;
pub mod handlers;
pub mod leads;
pub mod mailer;
pub mod models;
pub mod notifications;
pub mod scoring;
pub mod store;
pub mod validation;
