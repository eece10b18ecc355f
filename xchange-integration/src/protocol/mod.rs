/// HTTP transport abstraction, `Signer`/`ErrorMapper` hook points, and the default HTTP status
/// fallback taxonomy (spec §4.4–§4.6).
pub mod http;

/// WebSocket transport abstraction and the gzip sync-flush decompression helper (spec §4.9).
pub mod websocket;
