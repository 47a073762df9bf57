//! Visa application intake and payment backend
//!
//! HTTP handlers live in [`api`], business workflows in [`services`], and every
//! external collaborator (Postgres, payment processor, object storage, email)
//! sits behind a trait so the workflows can run against in-memory doubles.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod retry;
pub mod services;
pub mod storage;
