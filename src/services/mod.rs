/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room directory: create, list, load and delete games.
pub mod room_service;
/// Round intents committed through the compare-and-swap loop.
pub mod round_service;
/// Per-game Server-Sent Events streams.
pub mod sse_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
