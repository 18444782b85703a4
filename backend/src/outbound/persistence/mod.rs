//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! This module provides concrete implementations of domain repository ports
//! backed by PostgreSQL via the Diesel ORM with async support through
//! `diesel-async` and `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: Repository implementations only translate between
//!   Diesel models and domain types. No business logic resides here.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) are internal implementation details, never
//!   exposed to the domain layer.
//! - **Strongly typed errors**: All database errors are mapped to domain
//!   persistence error types.

mod diesel_ad_account_repository;
mod diesel_sync_log_repository;
mod diesel_sync_writer;
mod models;
pub(crate) mod pool;
pub(crate) mod schema;

pub use diesel_ad_account_repository::DieselAdAccountRepository;
pub use diesel_sync_log_repository::DieselSyncLogRepository;
pub use diesel_sync_writer::DieselSyncWriter;
pub use pool::{DbPool, PoolConfig, PoolError};
