//! # Media Stream Handler Module
//!
//! WebSocket endpoint for telephony media streams. The telephony provider
//! connects once per call and streams caller audio in; synthesized replies
//! go back out over the same socket.
//!
//! ## Connection Flow
//! 1. Provider connects to `/call/connection` and sends `connected`
//! 2. `start` announces the stream and call identifiers; a call session and
//!    a recognizer connection are created
//! 3. `media` frames carry base64 caller audio, forwarded to the recognizer
//! 4. `mark` frames acknowledge that a reply segment finished playing
//! 5. `stop` (or the socket closing) ends the session
//!
//! **Incoming Messages:**
//! - `{"event": "connected", "protocol": "Call", "version": "1.0.0"}`
//! - `{"event": "start", "streamSid": "MZ...", "start": {"streamSid": "MZ...", "callSid": "CA...", ...}}`
//! - `{"event": "media", "streamSid": "MZ...", "media": {"track": "inbound", "payload": "<base64>"}}`
//! - `{"event": "mark", "streamSid": "MZ...", "mark": {"name": "<label>"}}`
//! - `{"event": "stop", "streamSid": "MZ...", "stop": {"callSid": "CA..."}}`
//!
//! **Outgoing Messages:**
//! - `{"event": "media", "streamSid": "MZ...", "media": {"payload": "<base64>"}}` - one reply segment
//! - `{"event": "mark", "streamSid": "MZ...", "mark": {"name": "<label>"}}` - sent after each segment
//! - `{"event": "clear", "streamSid": "MZ..."}` - drop buffered audio on barge-in

pub mod error;
pub mod handler;
pub mod messages;
pub mod sink;
pub mod state;

pub use error::{MediaStreamError, MediaStreamResult};
pub use handler::media_stream_handler;
pub use messages::{IncomingMessage, OutgoingMessage};
pub use sink::MediaStreamSink;
pub use state::ActiveCall;
