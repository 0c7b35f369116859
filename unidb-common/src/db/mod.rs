//! Embedded document store and the bootstrap steps that run against it

pub mod dedup;
pub mod indexes;
pub mod init;
pub mod path;
pub mod schemas;
pub mod store;
pub mod validator;

pub use dedup::*;
pub use indexes::*;
pub use init::*;
pub use schemas::*;
pub use store::*;
pub use validator::*;
