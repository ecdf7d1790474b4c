//! 分段线路编解码
//!
//! 帧格式（网络字节序）：
//!
//! ```text
//! [4B magic][4B seq][4B ack][2B checksum][1B ctl][4B window]
//! [ 选项：重复的 (1B kind, value) ][1B END_OF_OPTION_LIST][载荷]
//! ```
//!
//! magic 不匹配或长度不足时不报错，原始字节原样透传给下一层
//! （与同通道上的非协议流量共存）。校验和启用时对整帧做 16 位
//! 反码求和，不匹配的帧被静默丢弃，由对端重传兜底。

use super::segment::{Segment, SegmentOption};
use thiserror::Error;

/// 帧识别用的魔数。
pub const MAGIC_NUMBER: u32 = 0x5245_4C54;

/// 固定头部长度：magic + seq + ack + checksum + ctl + window。
pub const FIXED_HDR_LEN: usize = 19;

/// 选项 kind 字节。
pub const OPT_END_OF_LIST: u8 = 0;
pub const OPT_MSS: u8 = 2;
pub const OPT_SACK: u8 = 5;
pub const OPT_TIMESTAMPS: u8 = 8;

/// 单帧解码失败。最多丢一帧，连接不受影响。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown option kind {0}")]
    UnknownOption(u8),
    #[error("frame truncated")]
    Truncated,
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// 解码结果：协议分段，或者透传的非协议字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Segment(Segment),
    PassThrough(Vec<u8>),
}

/// 把分段编码成一帧。`with_checksum` 控制是否填充校验和字段。
pub fn encode(seg: &Segment, with_checksum: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(FIXED_HDR_LEN + 24 + seg.payload.len());
    out.extend_from_slice(&MAGIC_NUMBER.to_be_bytes());
    out.extend_from_slice(&seg.seq.to_be_bytes());
    out.extend_from_slice(&seg.ack.to_be_bytes());
    out.extend_from_slice(&[0, 0]); // 校验和占位
    out.push(seg.ctl);
    out.extend_from_slice(&seg.window.to_be_bytes());

    for opt in seg.options() {
        out.push(opt.kind());
        match opt {
            SegmentOption::MaximumSegmentSize(mss) => {
                out.extend_from_slice(&mss.to_be_bytes());
            }
            SegmentOption::Timestamps { ts_val, ts_ecr } => {
                out.extend_from_slice(&ts_val.to_be_bytes());
                out.extend_from_slice(&ts_ecr.to_be_bytes());
            }
            SegmentOption::Sack(blocks) => {
                out.push((blocks.len() * 2) as u8);
                for (left, right) in blocks {
                    out.extend_from_slice(&left.to_be_bytes());
                    out.extend_from_slice(&right.to_be_bytes());
                }
            }
        }
    }
    out.push(OPT_END_OF_LIST);
    out.extend_from_slice(&seg.payload);

    if with_checksum {
        let sum = internet_checksum(&out);
        out[12] = (sum >> 8) as u8;
        out[13] = (sum & 0xff) as u8;
    }
    out
}

/// 解码一帧。magic 不匹配或长度不足 ⇒ `PassThrough`。
pub fn decode(bytes: Vec<u8>, with_checksum: bool) -> Result<Decoded, DecodeError> {
    if bytes.len() < FIXED_HDR_LEN + 1 || read_u32(&bytes, 0) != MAGIC_NUMBER {
        return Ok(Decoded::PassThrough(bytes));
    }

    if with_checksum && internet_checksum(&bytes) != 0 {
        return Err(DecodeError::ChecksumMismatch);
    }

    let seq = read_u32(&bytes, 4);
    let ack = read_u32(&bytes, 8);
    let ctl = bytes[14];
    let window = read_u32(&bytes, 15);

    let mut seg = Segment::new(seq, ack, ctl, window, Vec::new());
    let mut pos = FIXED_HDR_LEN;
    loop {
        let kind = *bytes.get(pos).ok_or(DecodeError::Truncated)?;
        pos += 1;
        match kind {
            OPT_END_OF_LIST => break,
            OPT_MSS => {
                let v = take(&bytes, pos, 2)?;
                seg.set_option(SegmentOption::MaximumSegmentSize(u16::from_be_bytes([
                    v[0], v[1],
                ])));
                pos += 2;
            }
            OPT_TIMESTAMPS => {
                let v = take(&bytes, pos, 8)?;
                seg.set_option(SegmentOption::Timestamps {
                    ts_val: u32::from_be_bytes([v[0], v[1], v[2], v[3]]),
                    ts_ecr: u32::from_be_bytes([v[4], v[5], v[6], v[7]]),
                });
                pos += 8;
            }
            OPT_SACK => {
                let count = *bytes.get(pos).ok_or(DecodeError::Truncated)? as usize;
                pos += 1;
                if count % 2 != 0 {
                    return Err(DecodeError::Truncated);
                }
                let mut blocks = Vec::with_capacity(count / 2);
                for _ in 0..count / 2 {
                    let v = take(&bytes, pos, 8)?;
                    blocks.push((
                        u32::from_be_bytes([v[0], v[1], v[2], v[3]]),
                        u32::from_be_bytes([v[4], v[5], v[6], v[7]]),
                    ));
                    pos += 8;
                }
                seg.set_option(SegmentOption::Sack(blocks));
            }
            other => return Err(DecodeError::UnknownOption(other)),
        }
    }

    seg.payload = bytes[pos..].to_vec();
    Ok(Decoded::Segment(seg))
}

/// 16 位反码和（进位回卷后取反）。对含零化校验和字段的整帧求值，
/// 校验时对整帧（含校验和）求值应得 0。
pub fn internet_checksum(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = bytes.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

fn read_u32(bytes: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
}

fn take(bytes: &[u8], pos: usize, n: usize) -> Result<&[u8], DecodeError> {
    bytes.get(pos..pos + n).ok_or(DecodeError::Truncated)
}
