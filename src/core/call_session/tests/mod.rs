//! Scenario tests for CallSession
//!
//! - `replies`: plain replies, tool round-trips, greeting, transcript contents
//! - `interruption`: barge-in, self-echo, short speech during playback
//! - `failures`: synthesis, model, tool and sink faults, reply deadline
//!
//! Stub providers live in `stubs`; session setup and waiting in `helpers`.

mod helpers;
