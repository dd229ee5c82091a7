// src/lib.rs

//! Синхронизация желаемого состояния пользователей, групп и OU с каталогом
//! Active Directory.

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod membership;
pub mod models;
pub mod raddb;
pub mod snapshot;
pub mod web;

pub use engine::Reconciler;
pub use error::SyncError;
pub use snapshot::Snapshot;
