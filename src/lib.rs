//! Study-planning core: the timer, exam, and flashcard state machines with
//! pluggable persistence, draft storage, and content-generation ports.

/// Signed-in identity installed by the host.
pub mod auth;
/// Configuration loading and point rates.
pub mod config;
/// Durable store port, entities, and backends.
pub mod dao;
/// Local draft persistence for in-progress state.
pub mod draft;
/// Request payloads and their validation.
pub mod dto;
/// Service-level error taxonomy.
pub mod error;
/// Orchestration services invoked by the host UI.
pub mod services;
/// Shared state and the state machines it coordinates.
pub mod state;
