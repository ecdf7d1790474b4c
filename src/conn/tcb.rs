//! 传输控制块
//!
//! 一条连接的全部协议变量，连接存续期内由状态机独占。
//! 发送侧窗口变量、接收侧窗口变量、拥塞控制变量，以及
//! 四个子组件：发送缓冲、重传队列、接收缓冲、RTT 估计器。

use super::config::Config;
use super::receive_buffer::ReceiveBuffer;
use super::retransmission::RetransmissionQueue;
use super::rtt::RttEstimator;
use super::send_buffer::SendBuffer;
use crate::seg::{Segment, serial};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub struct Tcb {
    pub iss: u32,
    pub irs: u32,

    // 发送侧
    pub snd_una: u32,
    pub snd_nxt: u32,
    pub snd_wnd: u32,
    pub snd_wl1: u32,
    pub snd_wl2: u32,
    pub max_snd_wnd: u32,
    pub send_mss: u32,

    // 拥塞控制
    pub cwnd: u32,
    pub ssthresh: u32,
    pub dup_acks: u32,

    // 接收侧
    pub rcv_nxt: u32,
    pub rcv_wnd: u32,

    pub send_buffer: SendBuffer,
    pub rtx: RetransmissionQueue,
    pub receive_buffer: ReceiveBuffer,
    pub rtt: RttEstimator,
}

impl Tcb {
    /// 按配置分配一个新 TCB。`cwnd` 取 3 个 MSS 的初始窗口，
    /// `ssthresh` 初始取一个远大于任何实际窗口的值（首次丢包
    /// 前全程慢启动）。
    pub fn new(cfg: &Config, iss: u32) -> Tcb {
        let mss = u32::from(cfg.base_mss);
        Tcb {
            iss,
            irs: 0,
            snd_una: iss,
            snd_nxt: iss,
            snd_wnd: 0,
            snd_wl1: 0,
            snd_wl2: 0,
            max_snd_wnd: 0,
            send_mss: mss,
            cwnd: 3 * mss,
            ssthresh: 1000 * mss,
            dup_acks: 0,
            rcv_nxt: 0,
            rcv_wnd: cfg.receive_budget,
            send_buffer: SendBuffer::new(),
            rtx: RetransmissionQueue::new(),
            receive_buffer: ReceiveBuffer::new(),
            rtt: RttEstimator::new(),
        }
    }

    /// 在途字节数（序列号空间口径，含 SYN/FIN 占位）。
    pub fn flight_size(&self) -> u32 {
        serial::sub(self.snd_nxt, self.snd_una)
    }

    /// 确认可接受性：`snd_una < ack ≤ snd_nxt`（序列号序）。
    pub fn is_acceptable_ack(&self, ack: u32) -> bool {
        serial::less_than(self.snd_una, ack) && serial::less_than_or_equal(ack, self.snd_nxt)
    }

    /// `snd_wl1/snd_wl2` 防回退规则下更新发送窗口：
    /// 仅当分段比上次更新窗口的分段更新（seq 更大，或 seq 相同
    /// 且 ack 不更旧）时才采纳其窗口通告。
    pub fn update_snd_wnd(&mut self, seg: &Segment) {
        if serial::less_than(self.snd_wl1, seg.seq)
            || (self.snd_wl1 == seg.seq && serial::less_than_or_equal(self.snd_wl2, seg.ack))
        {
            self.snd_wnd = seg.window;
            self.max_snd_wnd = self.max_snd_wnd.max(seg.window);
            self.snd_wl1 = seg.seq;
            self.snd_wl2 = seg.ack;
        }
    }

    /// 协商有效 MSS：取本端与对端通告的较小值。
    pub fn negotiate_mss(&mut self, peer_mss: u16) {
        self.send_mss = self.send_mss.min(u32::from(peer_mss));
        trace!(send_mss = self.send_mss, "MSS 协商");
    }

    /// 新确认推进 `snd_una` 后的拥塞窗口增长：慢启动每确认
    /// +1 MSS，拥塞避免每确认 +MSS²/cwnd（RFC 5681）。
    /// 快速恢复中的新确认把窗口收回 `ssthresh` 并退出恢复。
    pub fn on_new_ack(&mut self) {
        if self.dup_acks >= 3 {
            self.cwnd = self.ssthresh;
        } else if self.cwnd < self.ssthresh {
            self.cwnd += self.send_mss;
        } else {
            self.cwnd += (self.send_mss * self.send_mss / self.cwnd).max(1);
        }
        self.dup_acks = 0;
    }

    /// 重复确认计数（RFC 5681 §3.2）。返回 `true` 表示这是第
    /// 三个重复确认，调用方应立即重传最早的在途分段。恢复期内
    /// 的后续重复确认各把窗口再撑大一个 MSS。
    pub fn on_duplicate_ack(&mut self) -> bool {
        self.dup_acks += 1;
        if self.dup_acks == 3 {
            return true;
        }
        if self.dup_acks > 3 {
            self.cwnd += self.send_mss;
        }
        false
    }

    /// 快速重传的丢包响应：`ssthresh = max(在途/2, 2·MSS)`，
    /// 拥塞窗口取 `ssthresh + 3·MSS` 进入快速恢复。
    pub fn on_fast_retransmit_loss(&mut self) {
        self.ssthresh = (self.flight_size() / 2).max(2 * self.send_mss);
        self.cwnd = self.ssthresh + 3 * self.send_mss;
        trace!(cwnd = self.cwnd, ssthresh = self.ssthresh, "快速重传丢包响应");
    }

    /// 重传超时的丢包响应：`ssthresh = max(在途/2, 2·MSS)`，
    /// 拥塞窗口收缩回 1 个 MSS。
    pub fn on_timeout_loss(&mut self) {
        self.ssthresh = (self.flight_size() / 2).max(2 * self.send_mss);
        self.cwnd = self.send_mss;
        self.dup_acks = 0;
        trace!(cwnd = self.cwnd, ssthresh = self.ssthresh, "超时丢包响应");
    }

    /// 当前还能发出的字节数：`min(cwnd, snd_wnd) − 在途`。
    pub fn usable_window(&self) -> u32 {
        self.cwnd.min(self.snd_wnd).saturating_sub(self.flight_size())
    }

    /// 诊断快照。
    pub fn snapshot(&self) -> TcbSnapshot {
        TcbSnapshot {
            snd_una: self.snd_una,
            snd_nxt: self.snd_nxt,
            snd_wnd: self.snd_wnd,
            rcv_nxt: self.rcv_nxt,
            rcv_wnd: self.rcv_wnd,
            cwnd: self.cwnd,
            ssthresh: self.ssthresh,
            send_mss: self.send_mss,
            s_rtt_ms: self.rtt.s_rtt_ms(),
            rto_ms: self.rtt.rto(),
            unsent_bytes: self.send_buffer.len() as u64,
            inflight_segments: self.rtx.len() as u64,
            unread_bytes: self.receive_buffer.readable_bytes() as u64,
        }
    }
}

/// TCB 的只读诊断快照（纯观察者，无协议副作用）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcbSnapshot {
    pub snd_una: u32,
    pub snd_nxt: u32,
    pub snd_wnd: u32,
    pub rcv_nxt: u32,
    pub rcv_wnd: u32,
    pub cwnd: u32,
    pub ssthresh: u32,
    pub send_mss: u32,
    pub s_rtt_ms: u64,
    pub rto_ms: u64,
    pub unsent_bytes: u64,
    pub inflight_segments: u64,
    pub unread_bytes: u64,
}
