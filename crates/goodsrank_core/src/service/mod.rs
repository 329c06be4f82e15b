//! Core use-case services.
//!
//! # Responsibility
//! - Compose repository calls into the create/update/delete/list/reprioritize
//!   use cases.
//! - Keep callers decoupled from storage, cache and notification details.

pub mod goods_service;
