//! Tabular Q-learning on a stochastic frozen lake grid world.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod maps;
pub mod model;
pub mod policy;
pub mod render;
pub mod rl;

pub use error::{Error, Result};
