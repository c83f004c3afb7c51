//! Resilience helpers for backend and remote calls.

pub mod retry;
