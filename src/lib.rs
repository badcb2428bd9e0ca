pub mod alerts;
pub mod config;
pub mod error;
pub mod feed;
pub mod network;
pub mod simulation;

pub use alerts::*;
pub use config::*;
pub use error::*;
pub use network::*;
pub use simulation::*;
