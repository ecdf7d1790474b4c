//! 分段（协议数据单元）
//!
//! 定义线路上的分段：seq/ack、控制标志位、窗口、选项与载荷，
//! 以及捎带（piggyback）合并规则。

use super::serial;

/// 控制标志位（低位到高位）。
pub const FIN: u8 = 1 << 0;
pub const SYN: u8 = 1 << 1;
pub const RST: u8 = 1 << 2;
pub const PSH: u8 = 1 << 3;
pub const ACK: u8 = 1 << 4;

/// 分段选项。每种 kind 在一个分段里至多出现一次。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOption {
    /// 最大分段大小（仅随 SYN/SYN+ACK 携带）。
    MaximumSegmentSize(u16),
    /// RFC 7323 时间戳：`(ts_val, ts_ecr)`。
    Timestamps { ts_val: u32, ts_ecr: u32 },
    /// 选择确认块 `(left_edge, right_edge)`。只编解码，不驱动重传。
    Sack(Vec<(u32, u32)>),
}

impl SegmentOption {
    /// 线路上的 kind 字节。
    pub fn kind(&self) -> u8 {
        match self {
            SegmentOption::MaximumSegmentSize(_) => super::codec::OPT_MSS,
            SegmentOption::Sack(_) => super::codec::OPT_SACK,
            SegmentOption::Timestamps { .. } => super::codec::OPT_TIMESTAMPS,
        }
    }
}

/// 线路分段。每次发送/接收事件构造一次，之后不再修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seq: u32,
    pub ack: u32,
    pub ctl: u8,
    pub window: u32,
    options: Vec<SegmentOption>,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn new(seq: u32, ack: u32, ctl: u8, window: u32, payload: Vec<u8>) -> Segment {
        Segment {
            seq,
            ack,
            ctl,
            window,
            options: Vec::new(),
            payload,
        }
    }

    pub fn syn(seq: u32) -> Segment {
        Segment::new(seq, 0, SYN, 0, Vec::new())
    }

    pub fn syn_ack(seq: u32, ack: u32) -> Segment {
        Segment::new(seq, ack, SYN | ACK, 0, Vec::new())
    }

    pub fn ack(seq: u32, ack: u32) -> Segment {
        Segment::new(seq, ack, ACK, 0, Vec::new())
    }

    pub fn fin(seq: u32) -> Segment {
        Segment::new(seq, 0, FIN, 0, Vec::new())
    }

    pub fn fin_ack(seq: u32, ack: u32) -> Segment {
        Segment::new(seq, ack, FIN | ACK, 0, Vec::new())
    }

    pub fn rst(seq: u32) -> Segment {
        Segment::new(seq, 0, RST, 0, Vec::new())
    }

    pub fn rst_ack(seq: u32, ack: u32) -> Segment {
        Segment::new(seq, ack, RST | ACK, 0, Vec::new())
    }

    pub fn data(seq: u32, ack: u32, payload: Vec<u8>) -> Segment {
        Segment::new(seq, ack, ACK, 0, payload)
    }

    pub fn is_fin(&self) -> bool {
        self.ctl & FIN != 0
    }

    pub fn is_syn(&self) -> bool {
        self.ctl & SYN != 0
    }

    pub fn is_rst(&self) -> bool {
        self.ctl & RST != 0
    }

    pub fn is_psh(&self) -> bool {
        self.ctl & PSH != 0
    }

    pub fn is_ack(&self) -> bool {
        self.ctl & ACK != 0
    }

    pub fn is_only_ack(&self) -> bool {
        self.ctl == ACK && self.payload.is_empty()
    }

    pub fn is_only_fin(&self) -> bool {
        self.ctl == FIN && self.payload.is_empty()
    }

    /// 载荷字节数。
    pub fn len(&self) -> u32 {
        self.payload.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// 在序列号空间里占用的长度：SYN/FIN 各占一个序列号。
    pub fn seq_len(&self) -> u32 {
        let ctl_len = if self.is_syn() || self.is_fin() { 1 } else { 0 };
        self.len() + ctl_len
    }

    /// 本分段覆盖的最后一个序列号（空分段为 seq 本身）。
    pub fn last_seq(&self) -> u32 {
        if self.len() == 0 {
            self.seq
        } else {
            serial::add(self.seq, self.len() - 1)
        }
    }

    /// 对端必须确认的分段：纯 ACK 与 RST 不要求确认。
    pub fn must_be_acked(&self) -> bool {
        (!self.is_only_ack() && !self.is_rst()) || self.len() != 0
    }

    /// 选项列表（kind 唯一，顺序无意义）。
    pub fn options(&self) -> &[SegmentOption] {
        &self.options
    }

    /// 设置选项；同 kind 的旧值被替换。
    pub fn set_option(&mut self, opt: SegmentOption) {
        self.options.retain(|o| o.kind() != opt.kind());
        self.options.push(opt);
    }

    /// 读取时间戳选项。
    pub fn timestamps(&self) -> Option<(u32, u32)> {
        self.options.iter().find_map(|o| match o {
            SegmentOption::Timestamps { ts_val, ts_ecr } => Some((*ts_val, *ts_ecr)),
            _ => None,
        })
    }

    /// 读取 MSS 选项。
    pub fn mss_option(&self) -> Option<u16> {
        self.options.iter().find_map(|o| match o {
            SegmentOption::MaximumSegmentSize(mss) => Some(*mss),
            _ => None,
        })
    }

    /// 旧分段可被捎带进本分段：对方必须是同 seq 的纯 ACK 或纯 FIN，
    /// 且除 ACK 外不携带新信息。
    pub fn can_piggyback(&self, older: &Segment) -> bool {
        (older.is_only_ack() || older.is_only_fin()) && self.seq == older.seq
    }

    /// 把旧的纯 ACK/纯 FIN 合并进本分段，承载两者信息的并集。
    pub fn piggyback(mut self, older: &Segment) -> Segment {
        debug_assert!(self.can_piggyback(older));
        if older.is_ack() {
            self.ctl |= ACK;
            // 两个 ACK 同在时保留更新的确认号
            if !self.is_ack() || serial::less_than(self.ack, older.ack) {
                self.ack = older.ack;
            }
        }
        if older.is_fin() {
            self.ctl |= FIN;
        }
        self
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut labels = Vec::new();
        if self.is_psh() {
            labels.push("PSH");
        }
        if self.is_rst() {
            labels.push("RST");
        }
        if self.is_fin() {
            labels.push("FIN");
        }
        if self.is_syn() {
            labels.push("SYN");
        }
        if self.is_ack() {
            labels.push("ACK");
        }
        write!(
            f,
            "<SEQ={} ACK={} CTL={} WIN={} LEN={}>",
            self.seq,
            self.ack,
            labels.join(","),
            self.window,
            self.len()
        )
    }
}
