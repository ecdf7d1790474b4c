//! 诊断事件日志
//!
//! 结构化的 JSON 事件流：配置快照、状态迁移、收发分段、RTO、
//! TCB 快照。由被观察的连接直接持有（显式注入），纯观察者，
//! 对协议行为没有任何影响。实验程序结束时整体导出。

use crate::conn::{Config, State, TcbSnapshot};
use crate::exec::Moment;
use crate::seg::Segment;
use serde::{Deserialize, Serialize};

/// 单条诊断事件。`at` 为协议时间（毫秒）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    Meta {
        at: u64,
        config: Config,
    },
    State {
        at: u64,
        from: State,
        to: State,
    },
    SendSeg {
        at: u64,
        seq: u32,
        ack: u32,
        ctl: u8,
        len: u32,
        retrans: bool,
    },
    RecvSeg {
        at: u64,
        seq: u32,
        ack: u32,
        ctl: u8,
        len: u32,
    },
    Rto {
        at: u64,
        seq: u32,
        rto_ms: u64,
    },
    Tcb {
        at: u64,
        snap: TcbSnapshot,
    },
}

/// 内存事件收集器。
#[derive(Debug, Default)]
pub struct TraceLog {
    events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn new() -> TraceLog {
        TraceLog::default()
    }

    pub fn meta(&mut self, now: Moment, config: Config) {
        self.events.push(TraceEvent::Meta { at: now.0, config });
    }

    pub fn state(&mut self, now: Moment, from: State, to: State) {
        self.events.push(TraceEvent::State { at: now.0, from, to });
    }

    pub fn send_seg(&mut self, now: Moment, seg: &Segment, retrans: bool) {
        self.events.push(TraceEvent::SendSeg {
            at: now.0,
            seq: seg.seq,
            ack: seg.ack,
            ctl: seg.ctl,
            len: seg.len(),
            retrans,
        });
    }

    pub fn recv_seg(&mut self, now: Moment, seg: &Segment) {
        self.events.push(TraceEvent::RecvSeg {
            at: now.0,
            seq: seg.seq,
            ack: seg.ack,
            ctl: seg.ctl,
            len: seg.len(),
        });
    }

    pub fn rto(&mut self, now: Moment, seq: u32, rto_ms: u64) {
        self.events.push(TraceEvent::Rto { at: now.0, seq, rto_ms });
    }

    pub fn tcb(&mut self, now: Moment, snap: TcbSnapshot) {
        self.events.push(TraceEvent::Tcb { at: now.0, snap });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    /// 导出为 JSON 数组。
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }
}
