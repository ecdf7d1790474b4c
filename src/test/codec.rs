use crate::seg::codec::{self, DecodeError, Decoded};
use crate::seg::{Segment, SegmentOption};

fn sample_segment() -> Segment {
    let mut seg = Segment::data(100, 500, vec![1, 2, 3, 4, 5]);
    seg.window = 4096;
    seg.set_option(SegmentOption::MaximumSegmentSize(1200));
    seg.set_option(SegmentOption::Timestamps {
        ts_val: 7,
        ts_ecr: 3,
    });
    seg.set_option(SegmentOption::Sack(vec![(10, 20), (30, 40)]));
    seg
}

#[test]
fn round_trip_without_checksum() {
    let seg = sample_segment();
    let bytes = codec::encode(&seg, false);
    assert_eq!(codec::decode(bytes, false), Ok(Decoded::Segment(seg)));
}

#[test]
fn round_trip_with_checksum_verifies_to_zero() {
    let seg = sample_segment();
    let bytes = codec::encode(&seg, true);
    assert_eq!(codec::internet_checksum(&bytes), 0);
    assert_eq!(codec::decode(bytes, true), Ok(Decoded::Segment(seg)));
}

#[test]
fn empty_segment_round_trips() {
    let seg = Segment::ack(42, 43);
    let bytes = codec::encode(&seg, true);
    assert_eq!(codec::decode(bytes, true), Ok(Decoded::Segment(seg)));
}

#[test]
fn non_matching_magic_passes_through_unmodified() {
    let raw = b"hello neighbour, this is not a protocol frame".to_vec();
    assert_eq!(
        codec::decode(raw.clone(), true),
        Ok(Decoded::PassThrough(raw))
    );
}

#[test]
fn short_frame_passes_through() {
    let raw = codec::MAGIC_NUMBER.to_be_bytes().to_vec();
    assert_eq!(
        codec::decode(raw.clone(), false),
        Ok(Decoded::PassThrough(raw))
    );
}

#[test]
fn unknown_option_kind_is_a_frame_error() {
    let mut bytes = codec::encode(&Segment::ack(1, 2), false);
    // 把选项列表第一个 kind 字节改成未定义的 9
    bytes[codec::FIXED_HDR_LEN] = 9;
    assert_eq!(
        codec::decode(bytes, false),
        Err(DecodeError::UnknownOption(9))
    );
}

#[test]
fn truncated_option_is_a_frame_error() {
    let seg = sample_segment();
    let mut bytes = codec::encode(&seg, false);
    // 在时间戳选项中间截断
    bytes.truncate(codec::FIXED_HDR_LEN + 6);
    assert_eq!(codec::decode(bytes, false), Err(DecodeError::Truncated));
}

#[test]
fn checksum_mismatch_is_detected() {
    let seg = sample_segment();
    let mut bytes = codec::encode(&seg, true);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    assert_eq!(
        codec::decode(bytes, true),
        Err(DecodeError::ChecksumMismatch)
    );
}

#[test]
fn checksum_disabled_ignores_checksum_field() {
    let seg = sample_segment();
    let bytes = codec::encode(&seg, false);
    assert_eq!(bytes[12], 0);
    assert_eq!(bytes[13], 0);
    assert_eq!(codec::decode(bytes, false), Ok(Decoded::Segment(seg)));
}
