//! 通道边界
//!
//! 引擎与宿主通道层之间的接口：出站分段与生命周期事件经由
//! [`Channel`] 交给宿主；编解码只发生在这一层的帧入口。
//! [`Mailbox`] 是标准的信箱式实现，[`Endpoint`] 把一条连接和
//! 它的信箱捆成 [`crate::exec::World`] 可解析的端点。

mod link;

pub use link::{DeliverFrame, LinkParams, LinkStats, LinkWorld, OverlayLink};

use crate::conn::{Connection, TcbSnapshot, TransportError};
use crate::exec::Scheduler;
use crate::seg::{Decoded, Segment, codec};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// 连接标识。宿主容器用它把事件路由回正确的端点。
pub type ConnId = u64;

/// 上抛给应用/协作层的边界事件。
#[derive(Debug, Clone, PartialEq)]
pub enum ConnEvent {
    /// 握手完成。
    Established { snd_nxt: u32, rcv_nxt: u32 },
    /// 连接开始关闭。`initiated_by_remote` 指明由哪端发起。
    Closing { initiated_by_remote: bool },
    /// 连接终结。正常关闭时 `cause` 为 `None`。
    Closed { cause: Option<TransportError> },
    /// 接收缓冲有新的可读字节（当前累计可读量）。
    DataReadable { readable: usize },
    /// 周期性状态快照（诊断用）。
    Status(TcbSnapshot),
}

/// 宿主通道接口：接收出站分段与生命周期事件。
pub trait Channel {
    fn send_segment(&mut self, seg: Segment);
    fn notify(&mut self, ev: ConnEvent);
}

/// 信箱式通道：缓存出站分段与事件，等待宿主泵出。
#[derive(Debug, Default)]
pub struct Mailbox {
    outbound: VecDeque<Segment>,
    events: VecDeque<ConnEvent>,
}

impl Mailbox {
    pub fn new() -> Mailbox {
        Mailbox::default()
    }

    /// 取走全部待发分段。
    pub fn take_outbound(&mut self) -> Vec<Segment> {
        self.outbound.drain(..).collect()
    }

    /// 取走全部待处理事件。
    pub fn take_events(&mut self) -> Vec<ConnEvent> {
        self.events.drain(..).collect()
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }
}

impl Channel for Mailbox {
    fn send_segment(&mut self, seg: Segment) {
        self.outbound.push_back(seg);
    }

    fn notify(&mut self, ev: ConnEvent) {
        debug!(?ev, "边界事件");
        self.events.push_back(ev);
    }
}

/// 一条连接与其信箱。
pub struct Endpoint {
    pub conn: Connection,
    pub chan: Mailbox,
    /// 非协议帧透传计数。
    pub pass_through: u64,
    /// 解码失败（坏校验和 / 未知选项）丢帧计数。
    pub frames_dropped: u64,
}

impl Endpoint {
    pub fn new(conn: Connection) -> Endpoint {
        Endpoint {
            conn,
            chan: Mailbox::new(),
            pass_through: 0,
            frames_dropped: 0,
        }
    }

    /// 通道入口：对一帧原始字节解码并交给状态机。
    /// 非协议帧透传计数后丢弃；解码失败最多损失这一帧。
    pub fn on_frame(&mut self, sched: &mut Scheduler, bytes: Vec<u8>) {
        let with_checksum = self.conn.config().checksum;
        match codec::decode(bytes, with_checksum) {
            Ok(Decoded::Segment(seg)) => {
                self.conn.on_segment(sched, &mut self.chan, seg);
            }
            Ok(Decoded::PassThrough(raw)) => {
                self.pass_through += 1;
                debug!(len = raw.len(), "非协议帧透传");
            }
            Err(e) => {
                self.frames_dropped += 1;
                warn!(error = %e, "丢弃无法解码的帧");
            }
        }
    }
}
