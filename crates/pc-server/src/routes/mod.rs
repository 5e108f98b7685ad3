//! Route handlers for the relay.

pub mod delayed;
pub mod fragments;
pub mod health;
pub mod sync;
