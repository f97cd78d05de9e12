//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and fallback endpoints
//! - `media_stream` - Telephony media stream WebSocket

pub mod api;
pub mod media_stream;

pub use media_stream::media_stream_handler;
