//! Core type definitions for Sourceplane Thin-CI
//!
//! This module contains the records the engine trades in:
//! - Intent side: Repository, Component, Relationship
//! - Provider side: ProviderMetadata, ProviderAction, ActionStep
//! - Plan side: Plan, Job, PlanRequest

mod intent;
mod plan;
mod provider;

pub use intent::{
    Component, IntentError, ProviderRef, Relationship, Repository, RepositoryMetadata,
};
pub use plan::{Job, JobMetadata, Plan, PlanMetadata, PlanRequest};
pub(crate) use plan::RESERVED_JOB_KEYS;
pub use provider::{ActionStep, ProviderAction, ProviderMetadata, ThinCiConfig};
