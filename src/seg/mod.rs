//! 分段层：序列号算术、分段定义与线路编解码。

pub mod codec;
mod segment;
pub mod serial;

pub use codec::{DecodeError, Decoded};
pub use segment::{Segment, SegmentOption, ACK, FIN, PSH, RST, SYN};
