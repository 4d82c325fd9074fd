//! GitHub REST adapter for the checkgroup ports.
//!
//! [`GithubClient`] implements both [`checkgroup_core::CheckRunApi`] and
//! [`checkgroup_core::WorkflowApi`] for one repository.

pub mod client;
pub mod config;
pub mod error;

pub use client::GithubClient;
pub use config::{GithubConfig, RepoRef, DEFAULT_API_URL};
pub use error::GithubError;
