//! Model client implementations.
//!
//! The engine itself ships no network-backed provider; real providers are
//! thin adapters implemented downstream against [`crate::model::ModelClient`].
//! [`mock`] provides the deterministic double used by this crate's tests.

pub mod mock;
