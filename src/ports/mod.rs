//! Port traits between the domain and its collaborators.

pub mod config_port;
pub mod data_port;
pub mod notify_port;
pub mod report_port;
pub mod store_port;
