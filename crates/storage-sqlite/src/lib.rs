//! SQLite storage implementation for ecomap.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository traits defined in `ecomap-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The mapping rule store (seeded at startup) and the append-only decision log
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//!
//! ```text
//! core (domain)          lci-data (providers)
//!       │                      │
//!       └──────────┬───────────┘
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod mapping;
pub mod schema;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use mapping::{MappingDecisionRepository, MappingRuleRepository};

// Re-export from ecomap-core for convenience
pub use ecomap_core::errors::{DatabaseError, Error, Result};
