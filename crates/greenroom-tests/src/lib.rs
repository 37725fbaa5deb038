//! Integration test crate for Greenroom.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! Everything here runs on the CPU keyer or a scripted backend, so no GPU
//! is required.

#[cfg(test)]
mod mock;

#[cfg(test)]
mod scheduler;

#[cfg(test)]
mod keying;

#[cfg(test)]
mod sessions;
