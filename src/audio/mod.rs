pub mod chunk;
pub mod file;

pub use chunk::{chunks, ChunkConfig, PcmChunks};
pub use file::AudioFile;
