//! 出站分段队列
//!
//! 一次事件处理期间产生的出站分段先在这里排队，事件结束时统一
//! 冲刷到通道。入队时执行捎带合并：排在队尾的纯 ACK / 纯 FIN
//! 若与新分段同 seq，则并入新分段，不再单独占一帧。

use crate::seg::Segment;
use std::collections::VecDeque;
use tracing::trace;

#[derive(Debug, Default)]
pub struct OutgoingSegmentQueue {
    q: VecDeque<Segment>,
}

impl OutgoingSegmentQueue {
    pub fn new() -> OutgoingSegmentQueue {
        OutgoingSegmentQueue::default()
    }

    /// 入队，必要时吞并队尾可捎带的旧分段。
    pub fn push(&mut self, seg: Segment) {
        if let Some(last) = self.q.back() {
            if seg.can_piggyback(last) {
                let older = self.q.pop_back().expect("back then pop");
                trace!(%older, newer = %seg, "捎带合并");
                self.q.push_back(seg.piggyback(&older));
                return;
            }
        }
        self.q.push_back(seg);
    }

    /// 按入队顺序取走全部分段。
    pub fn drain(&mut self) -> impl Iterator<Item = Segment> + '_ {
        self.q.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }
}
