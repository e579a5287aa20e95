//! Target environment routing

pub mod resolver;
