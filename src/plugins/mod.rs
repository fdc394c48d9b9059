//! Capability interfaces and their local adapters.
//!
//! Each capability is a trait the interpreter consumes; the structs beside
//! them are the implementations the `parley` binary wires up.

pub mod data_query;
pub mod fs;
pub mod handlers;
pub mod sandbox;
