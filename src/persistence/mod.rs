//! Persistence layer: row models and shared SQL helpers.
//!
//! The relational store is the single source of truth for users,
//! owners, chairs, rides, the ride-status log, coupons, payment tokens,
//! and the chair location log. Handlers open one short transaction
//! each; row locking (`FOR UPDATE`) is limited to coupon selection and
//! the ride row when a chair mutates it.

pub mod models;
pub mod queries;
