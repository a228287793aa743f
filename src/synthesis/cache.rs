//! Per-pipeline cache of synthesized clips.
//!
//! Keys are the exact text plus voice id, with no normalization. The cache
//! is bounded by entry count and evicts the least recently used clip; a
//! capacity of 0 means unbounded, which is only sensible for short-lived
//! sessions.
//!
//! Lookups and inserts take the lock briefly and never hold it across a
//! backend call. Two concurrent misses on the same key may both reach the
//! backend; the later insert wins.

use super::{require_text, SynthesisResult, Synthesizer};
use crate::audio::AudioClip;
use crate::error::Result;
use crate::voice::VoiceId;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    text: String,
    voice: VoiceId,
}

#[derive(Debug)]
struct CacheEntry {
    clip: AudioClip,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}

/// Cache counters, for logs and the CLI summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU cache of clips keyed by `(text, voice)`.
#[derive(Debug)]
pub struct SynthesisCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl SynthesisCache {
    /// Create a cache holding at most `capacity` clips (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are replaced whole, so a poisoned lock still guards a consistent map.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a clip, marking it as recently used.
    pub fn get(&self, text: &str, voice: &VoiceId) -> Option<AudioClip> {
        let key = CacheKey {
            text: text.to_string(),
            voice: voice.clone(),
        };
        let mut guard = self.lock();
        let state = &mut *guard;
        let tick = state.next_tick();
        match state.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_used = tick;
                let clip = entry.clip.clone();
                state.hits += 1;
                Some(clip)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store a clip, evicting the least recently used entries beyond capacity.
    pub fn insert(&self, text: &str, voice: &VoiceId, clip: AudioClip) {
        let key = CacheKey {
            text: text.to_string(),
            voice: voice.clone(),
        };
        let mut state = self.lock();
        let last_used = state.next_tick();
        state.entries.insert(key, CacheEntry { clip, last_used });

        if self.capacity > 0 {
            while state.entries.len() > self.capacity {
                state.evict_oldest();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            capacity: self.capacity,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }
}

/// A synthesizer that consults a [`SynthesisCache`] before the backend.
pub struct CachedSynthesizer {
    inner: Arc<dyn Synthesizer>,
    cache: Arc<SynthesisCache>,
}

impl CachedSynthesizer {
    pub fn new(inner: Arc<dyn Synthesizer>, cache: Arc<SynthesisCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<SynthesisCache> {
        &self.cache
    }
}

#[async_trait]
impl Synthesizer for CachedSynthesizer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn validate_voice(&self, voice: &VoiceId) -> Result<()> {
        self.inner.validate_voice(voice)
    }

    async fn synthesize(&self, text: &str, voice: &VoiceId) -> SynthesisResult {
        require_text(text)?;

        if let Some(clip) = self.cache.get(text, voice) {
            trace!("Cache hit for voice {}", voice);
            return Ok(clip);
        }

        let clip = self.inner.synthesize(text, voice).await?;
        self.cache.insert(text, voice, clip.clone());
        debug!("Cached clip for voice {} ({} bytes)", voice, clip.len());
        Ok(clip)
    }
}
