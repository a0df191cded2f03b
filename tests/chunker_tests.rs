// Integration tests for client-side PCM chunking

use avatar_stream::audio::{chunks, ChunkConfig};

#[test]
fn test_chunk_count_is_ceiling_of_input_over_chunk_size() {
    let chunk_size = ChunkConfig::default().bytes_per_chunk();

    for len in [1usize, 2, 3199, 3200, 3201, 6400, 16_000, 32_002] {
        let pcm = vec![0u8; len];
        let expected = (len + chunk_size - 1) / chunk_size;
        assert_eq!(chunks(&pcm, 100, 16000).count(), expected, "input of {} bytes", len);
    }
}

#[test]
fn test_concatenated_chunks_reproduce_input() {
    let pcm: Vec<u8> = (0..12_345u32).map(|i| (i * 7) as u8).collect();

    for chunk_ms in [10, 20, 100, 250] {
        let joined: Vec<u8> = chunks(&pcm, chunk_ms, 16000).flatten().copied().collect();
        assert_eq!(joined, pcm, "chunk_ms = {}", chunk_ms);
    }
}

#[test]
fn test_only_last_chunk_may_be_short() {
    let pcm = vec![1u8; 10_000];
    let config = ChunkConfig::new(20, 16000);
    let sizes: Vec<usize> = config.chunks(&pcm).map(|c| c.len()).collect();

    let (last, full) = sizes.split_last().unwrap();
    assert!(full.iter().all(|&size| size == 640));
    assert!(*last > 0 && *last <= 640);
}
