use std::time::Duration;

/// Recommended chunk duration for streaming
pub const DEFAULT_CHUNK_MS: u32 = 100;
/// Input sample rate the renderer expects
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
/// 16-bit mono
const BYTES_PER_SAMPLE: usize = 2;

/// Chunking parameters for outgoing PCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Duration of each chunk in milliseconds (default: 100)
    pub chunk_ms: u32,
    /// Sample rate of the PCM being chunked (default: 16000)
    pub sample_rate: u32,
}

impl ChunkConfig {
    pub fn new(chunk_ms: u32, sample_rate: u32) -> Self {
        Self {
            chunk_ms,
            sample_rate,
        }
    }

    /// Bytes per chunk: sample_rate × chunk_ms / 1000 × 2, never less than one sample
    pub fn bytes_per_chunk(&self) -> usize {
        let samples = self.sample_rate as usize * self.chunk_ms as usize / 1000;
        (samples * BYTES_PER_SAMPLE).max(BYTES_PER_SAMPLE)
    }

    /// Pacing interval between chunk sends
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_millis(self.chunk_ms as u64)
    }

    /// Slice `pcm` into chunks of this configuration
    pub fn chunks<'a>(&self, pcm: &'a [u8]) -> PcmChunks<'a> {
        PcmChunks {
            inner: pcm.chunks(self.bytes_per_chunk()),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_ms: DEFAULT_CHUNK_MS,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Slice raw 16-bit mono PCM into fixed-duration chunks.
///
/// Yields full-size slices followed by one shorter slice when the input is not
/// an exact multiple of the chunk size. Nothing is copied; call again to
/// restart from the beginning.
pub fn chunks(pcm: &[u8], chunk_ms: u32, sample_rate: u32) -> PcmChunks<'_> {
    ChunkConfig::new(chunk_ms, sample_rate).chunks(pcm)
}

/// Iterator returned by [`chunks`]
#[derive(Debug, Clone)]
pub struct PcmChunks<'a> {
    inner: std::slice::Chunks<'a, u8>,
}

impl<'a> Iterator for PcmChunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for PcmChunks<'_> {}
