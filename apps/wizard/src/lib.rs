//! Client-side session sync and navigation guard for the application wizard.

pub mod action;
pub mod backend;
pub mod client;
pub mod config;
pub mod errors;
pub mod guard;
pub mod messages;
pub mod models;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;
pub mod view;

#[cfg(test)]
mod testing;

pub use client::{ClientOptions, WizardClient};
pub use errors::ClientError;
