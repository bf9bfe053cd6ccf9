/// Persistence backends for game records.
pub mod game_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer shared by every backend.
pub mod storage;
