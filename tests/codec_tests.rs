// Integration tests for the server → client binary codec
//
// Every message the encoder produces must decode back to the same fields,
// and malformed input must fail with a typed error rather than panic.

use avatar_stream::protocol::codec::{
    decode, DecodeError, DecodedMessage, FrameEncoder, AUDIO_HEADER_LEN, TAG_AUDIO, TAG_VIDEO,
    VIDEO_HEADER_LEN,
};

fn jpeg_like(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_video_round_trip_across_payload_sizes() {
    let encoder = FrameEncoder::default();

    for len in [0, 1, 2, 1024, 65_535, 65_536, 1 << 20] {
        let jpeg = jpeg_like(len);
        let msg = encoder
            .encode_video(512, 512, 24.5, 1_700_000_000.125, &jpeg)
            .unwrap();
        assert_eq!(msg.len(), VIDEO_HEADER_LEN + len);

        match decode(&msg).unwrap() {
            DecodedMessage::Video(frame) => {
                assert_eq!(frame.width, 512);
                assert_eq!(frame.height, 512);
                assert_eq!(frame.fps, 24.5);
                assert_eq!(frame.timestamp, 1_700_000_000.125);
                assert_eq!(frame.jpeg, jpeg);
            }
            other => panic!("expected video, got tag {:#x}", other.tag()),
        }
    }
}

#[test]
fn test_audio_round_trip_across_payload_sizes() {
    let encoder = FrameEncoder::default();

    for len in [0, 2, 640, 3200, 65_536] {
        let pcm = jpeg_like(len);
        let msg = encoder.encode_audio(22050, 2, 42.0, &pcm).unwrap();
        assert_eq!(msg.len(), AUDIO_HEADER_LEN + len);

        match decode(&msg).unwrap() {
            DecodedMessage::Audio(chunk) => {
                assert_eq!(chunk.sample_rate, 22050);
                assert_eq!(chunk.channels, 2);
                assert_eq!(chunk.timestamp, 42.0);
                assert_eq!(chunk.pcm, pcm);
            }
            other => panic!("expected audio, got tag {:#x}", other.tag()),
        }
    }
}

#[test]
fn test_every_header_truncation_is_rejected() {
    let encoder = FrameEncoder::default();
    let video = encoder.encode_video(2, 2, 25.0, 0.0, &[1, 2, 3]).unwrap();
    let audio = encoder.encode_audio(16000, 1, 0.0, &[1, 2]).unwrap();

    for cut in 1..VIDEO_HEADER_LEN {
        assert_eq!(
            decode(&video[..cut]),
            Err(DecodeError::TruncatedHeader {
                tag: TAG_VIDEO,
                expected: VIDEO_HEADER_LEN,
                actual: cut,
            })
        );
    }

    for cut in 1..AUDIO_HEADER_LEN {
        assert!(matches!(
            decode(&audio[..cut]),
            Err(DecodeError::TruncatedHeader { tag: TAG_AUDIO, .. })
        ));
    }
}

#[test]
fn test_payload_shorter_than_declared_is_rejected() {
    let encoder = FrameEncoder::default();
    let msg = encoder.encode_video(2, 2, 25.0, 0.0, &[0u8; 100]).unwrap();

    assert_eq!(
        decode(&msg[..VIDEO_HEADER_LEN + 40]),
        Err(DecodeError::TruncatedPayload {
            tag: TAG_VIDEO,
            declared: 100,
            available: 40,
        })
    );
}

#[test]
fn test_unknown_tag_is_rejected() {
    assert_eq!(decode(&[0xFF]), Err(DecodeError::UnknownTag(0xFF)));
    assert_eq!(decode(&[0x00, 1, 2, 3]), Err(DecodeError::UnknownTag(0x00)));
}
