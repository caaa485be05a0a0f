/// In-memory store backend for tests and degraded-mode development.
pub mod memory;
/// Durable entity definitions.
pub mod models;
/// Storage abstraction layer shared by every backend.
pub mod storage;
/// Durable store port consumed by the services.
pub mod study_store;
