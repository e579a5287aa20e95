//! Wire models exchanged between GitHub Actions, the relay gateway and the
//! deployment server.

pub mod models;

pub use models::*;
