//! # unidb Common Library
//!
//! Bootstrap logic for the university analytics document store:
//! - Embedded document store on SQLite (collections, validators, indexes)
//! - Schema validator installation and auditing
//! - Secondary index plans
//! - Duplicate cleanup
//! - ETL migration from raw extract collections to destination collections
//! - Raw extract import and the full bootstrap runbook

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod etl;
pub mod import;

pub use db::{Document, DocumentStore};
pub use error::{Error, Result};
