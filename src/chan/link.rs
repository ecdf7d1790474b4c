//! 内存覆盖链路
//!
//! 连接两个端点的不可靠报文通道：可配置单向时延、概率丢帧与
//! 概率复制，随机源为确定性 xorshift（给定种子可完整复现）。
//! 编解码只发生在这条边界上；实验程序与端到端测试都以它为宿主。

use super::{ConnId, Endpoint};
use crate::exec::{Event, Scheduler, World};
use crate::seg::{Segment, codec};
use tracing::trace;

/// 链路参数。
#[derive(Debug, Clone)]
pub struct LinkParams {
    pub latency_ms: u64,
    /// 单帧丢弃概率 [0, 1)。
    pub loss: f64,
    /// 未丢弃帧的复制概率 [0, 1)。
    pub duplicate: f64,
    pub seed: u64,
}

impl Default for LinkParams {
    fn default() -> LinkParams {
        LinkParams {
            latency_ms: 10,
            loss: 0.0,
            duplicate: 0.0,
            seed: 42,
        }
    }
}

/// xorshift64* 确定性随机源。
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> XorShift64 {
        XorShift64(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// 链路计数。
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    pub forwarded: u64,
    pub dropped: u64,
    pub duplicated: u64,
}

/// 有损链路模型：对每一帧决定丢弃 / 投递 / 复制投递。
pub struct OverlayLink {
    params: LinkParams,
    rng: XorShift64,
    pub stats: LinkStats,
}

impl OverlayLink {
    pub fn new(params: LinkParams) -> OverlayLink {
        let rng = XorShift64::new(params.seed);
        OverlayLink {
            params,
            rng,
            stats: LinkStats::default(),
        }
    }

    /// 一帧的投递份数（0 表示丢弃）。
    fn copies(&mut self) -> u32 {
        if self.rng.next_f64() < self.params.loss {
            0
        } else if self.rng.next_f64() < self.params.duplicate {
            2
        } else {
            1
        }
    }
}

/// 双端点宿主：A、B 两条连接经同一条有损链路互联。
pub struct LinkWorld {
    pub a: Endpoint,
    pub b: Endpoint,
    link: OverlayLink,
    checksum: bool,
}

impl LinkWorld {
    pub const A: ConnId = 0;
    pub const B: ConnId = 1;

    pub fn new(a: Endpoint, b: Endpoint, params: LinkParams) -> LinkWorld {
        let checksum = a.conn.config().checksum;
        LinkWorld {
            a,
            b,
            link: OverlayLink::new(params),
            checksum,
        }
    }

    pub fn stats(&self) -> &LinkStats {
        &self.link.stats
    }

    /// 向某端注入一帧原始字节（透传/损伤实验用）。
    pub fn inject(&self, sched: &mut Scheduler, to: ConnId, bytes: Vec<u8>) {
        sched.schedule_after(self.link.params.latency_ms, DeliverFrame { to, bytes });
    }

    fn forward(&mut self, sched: &mut Scheduler, segs: Vec<Segment>, to: ConnId) {
        for seg in segs {
            let n = self.link.copies();
            if n == 0 {
                self.link.stats.dropped += 1;
                trace!(%seg, to, "链路丢帧");
                continue;
            }
            self.link.stats.forwarded += 1;
            if n > 1 {
                self.link.stats.duplicated += 1;
            }
            let bytes = codec::encode(&seg, self.checksum);
            for _ in 0..n {
                sched.schedule_after(
                    self.link.params.latency_ms,
                    DeliverFrame {
                        to,
                        bytes: bytes.clone(),
                    },
                );
            }
        }
    }
}

impl World for LinkWorld {
    fn endpoint_mut(&mut self, id: ConnId) -> Option<&mut Endpoint> {
        match id {
            Self::A => Some(&mut self.a),
            Self::B => Some(&mut self.b),
            _ => None,
        }
    }

    /// 每个事件之后把两侧信箱里的出站分段泵进链路。
    fn on_tick(&mut self, sched: &mut Scheduler) {
        let a_out = self.a.chan.take_outbound();
        self.forward(sched, a_out, Self::B);
        let b_out = self.b.chan.take_outbound();
        self.forward(sched, b_out, Self::A);
    }
}

/// 一帧原始字节抵达某端点。
pub struct DeliverFrame {
    pub to: ConnId,
    pub bytes: Vec<u8>,
}

impl Event for DeliverFrame {
    fn execute(self: Box<Self>, sched: &mut Scheduler, world: &mut dyn World) {
        if let Some(ep) = world.endpoint_mut(self.to) {
            ep.on_frame(sched, self.bytes);
        }
    }
}
