//! Core types and configuration for the dialectical reasoning engine.
//!
//! Provides the per-query data model ([`result::DialecticResult`], its trace and
//! timing metadata, per-phase records) and the layered configuration loader.

pub mod config;
pub mod result;
