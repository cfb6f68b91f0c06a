//! # Stowage
//!
//! A multi-user file store with versioning, hierarchical groups, role-based
//! permissions and per-file sharing. Usable both as a standalone binary and
//! as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! stowage = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stowage::blob::FsBlobStore;
//! use stowage::config::ServerConfig;
//! use stowage::server::{AppState, create_router};
//! use stowage::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let blobs = Arc::new(FsBlobStore::new(&config.data_dir));
//! let secret = config.resolve_jwt_secret().unwrap();
//! let state = Arc::new(AppState::new(Arc::new(store), blobs, config, &secret).unwrap());
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `stowage` binary. Disable with `default-features = false`.

pub mod auth;
pub mod blob;
pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
