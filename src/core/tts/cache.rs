//! In-memory cache of synthesized audio.
//!
//! Scripted phrases (greeting, hold message, apology) are spoken on almost
//! every call, so their audio is kept keyed by voice and text.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;

use super::base::AudioData;

const DEFAULT_MAX_ENTRIES: u64 = 1_024;
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct SynthesisCache {
    entries: Cache<u128, AudioData>,
}

impl SynthesisCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cache key: xxh3 over the voice and the trimmed text.
    pub fn key(voice: &str, text: &str) -> u128 {
        let mut material = String::with_capacity(voice.len() + text.len() + 1);
        material.push_str(voice);
        material.push('\u{1f}');
        material.push_str(text.trim());
        xxh3_128(material.as_bytes())
    }

    pub async fn get(&self, voice: &str, text: &str) -> Option<AudioData> {
        let hit = self.entries.get(&Self::key(voice, text)).await;
        debug!(hit = hit.is_some(), "Synthesis cache lookup for '{}'", text);
        hit
    }

    pub async fn insert(&self, voice: &str, text: &str, audio: AudioData) {
        self.entries.insert(Self::key(voice, text), audio).await;
    }
}

impl Default for SynthesisCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }
}
