//! Core of the inline-command interpreter.
//!
//! Grammar and extraction, the permission matrix and its override store,
//! dispatch, transcript assembly and prompt building live here, along with the
//! shared store, database and error plumbing.

pub mod assembler;
pub mod broker;
pub mod command;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod grammar;
pub mod interpreter;
pub mod mode;
pub mod outcome;
pub mod overrides;
pub mod permission;
pub mod principal;
pub mod prompt;
pub mod schemas;
pub mod store;
pub mod time;
