//! HTTP handlers.

pub mod admin;
pub mod health;
pub mod listings;
pub mod offers;
pub mod partner;
pub mod transactions;
pub mod webhook;
