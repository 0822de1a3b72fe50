//! # Fieldserve
//!
//! A tracking backend for municipal field-service contracts, usable both as a
//! standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::{Path, PathBuf};
//! use fieldserve::mail::LogMailer;
//! use fieldserve::photos::PhotoStore;
//! use fieldserve::server::{AppState, create_router};
//! use fieldserve::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/fieldserve.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState {
//!     store: Arc::new(store),
//!     photos: PhotoStore::new(Path::new("./data")),
//!     mailer: Arc::new(LogMailer),
//!     frontend_url: None,
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod import;
pub mod mail;
pub mod photos;
pub mod server;
pub mod store;
pub mod types;
