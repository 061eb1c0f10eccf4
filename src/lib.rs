//! Kiln - package-recipe build orchestrator
//!
//! Resolves a recipe's requirements against package indexes, plans a build
//! layout keyed by the settings, writes CMake inputs for the resolved graph
//! and drives the native configure and build steps.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod generators;
pub mod index;
pub mod layout;
pub mod pipeline;
pub mod recipe;
pub mod resolver;
pub mod settings;
pub mod ui;

pub use error::{KilnError, KilnResult};
