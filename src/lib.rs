//! Competitive-circuit data sync: scrapes wiki portals and the platform API,
//! normalizes what it finds, and reconciles player identity across both
//! sources. [`sync::SyncOrchestrator`] drives the stage pipeline; everything
//! below it talks to storage through [`repo::Repository`].

pub mod config;
pub mod extract;
pub mod fetch;
pub mod identity;
pub mod ingest;
pub mod model;
pub mod normalization;
pub mod notify;
pub mod platform;
pub mod repo;
pub mod sync;
pub mod util;
