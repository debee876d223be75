pub mod client;
pub mod domains;
pub mod model;
pub mod wire;

pub use client::{MenzaClient, MenzaClientConfig};
pub use domains::{Domains, MenzaParams};
