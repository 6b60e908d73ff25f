pub mod domain;
pub mod models;
pub mod rpc;

pub use domain::Domain;
pub use rpc::{OdooClient, OdooError, OdooSession};
