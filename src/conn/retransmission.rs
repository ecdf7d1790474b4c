//! 重传队列与重传定时器
//!
//! 队列：已交给通道、尚未被确认的分段（FIFO）。累计确认到来时
//! 从队首摘除被完整覆盖的分段并兑现其确认信号；落在分段中间的
//! 确认只裁掉已确认前缀，余下部分留队待重传。
//!
//! 定时器：任一时刻至多挂在最早未确认分段上。确认先到则取消，
//! 超时先到则重传——两个触发方通过一次性的原子认领互斥，
//! 先提交者生效：取消后不会再重传，重传派发后取消不再有效果。

use crate::chan::ConnId;
use crate::exec::{Event, Promise, Scheduler, World};
use crate::seg::{Segment, serial};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::trace;

/// 在途分段与它的确认信号。
#[derive(Debug)]
pub struct Inflight {
    pub seg: Segment,
    pub ack_promise: Promise,
}

/// 在途（已发送、未确认）分段的 FIFO。
#[derive(Debug, Default)]
pub struct RetransmissionQueue {
    q: VecDeque<Inflight>,
}

impl RetransmissionQueue {
    pub fn new() -> RetransmissionQueue {
        RetransmissionQueue::default()
    }

    /// 登记一个在途分段，返回其确认信号句柄。
    pub fn enqueue(&mut self, seg: Segment) -> Promise {
        let p = Promise::new();
        self.q.push_back(Inflight {
            seg,
            ack_promise: p.clone(),
        });
        p
    }

    pub fn peek_oldest(&self) -> Option<&Segment> {
        self.q.front().map(|i| &i.seg)
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// 应用累计确认 `ack`：兑现被完整覆盖的分段，裁剪被部分
    /// 覆盖的队首分段。返回完整确认的分段数。
    pub fn remove_acked(&mut self, ack: u32) -> usize {
        let mut fully_acked = 0;
        while let Some(front) = self.q.front() {
            let end = serial::add(front.seg.seq, front.seg.seq_len());
            if serial::less_than_or_equal(end, ack) {
                let inflight = self.q.pop_front().expect("front then pop");
                inflight.ack_promise.try_fulfill();
                fully_acked += 1;
                continue;
            }
            break;
        }
        // 部分确认：裁掉队首分段的已确认前缀
        if let Some(front) = self.q.front_mut() {
            if serial::greater_than(ack, front.seg.seq) && !front.seg.payload.is_empty() {
                let n = serial::sub(ack, front.seg.seq) as usize;
                if n <= front.seg.payload.len() {
                    front.seg.payload.drain(..n);
                    front.seg.seq = ack;
                    trace!(trimmed = n, seq = front.seg.seq, "部分确认裁剪");
                }
            }
        }
        fully_acked
    }

    /// 中止：以 `cause` 失败所有未决的确认信号并清空队列。
    pub fn release_all(&mut self, cause: crate::conn::TransportError) {
        for inflight in self.q.drain(..) {
            inflight.ack_promise.try_fail(cause);
        }
    }
}

const TIMER_ARMED: u8 = 0;
const TIMER_FIRED: u8 = 1;
const TIMER_CANCELLED: u8 = 2;

/// 重传定时器的认领句柄。armed / fired / cancelled 三态，
/// 离开 armed 的迁移是一次性的 compare-exchange。
#[derive(Debug, Clone)]
pub struct TimerHandle(Arc<AtomicU8>);

impl TimerHandle {
    pub fn new() -> TimerHandle {
        TimerHandle(Arc::new(AtomicU8::new(TIMER_ARMED)))
    }

    /// 超时方认领。仅当此前未被取消时成功。
    pub fn try_fire(&self) -> bool {
        self.0
            .compare_exchange(TIMER_ARMED, TIMER_FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 确认方认领。仅当超时尚未派发时成功。
    pub fn cancel(&self) -> bool {
        self.0
            .compare_exchange(
                TIMER_ARMED,
                TIMER_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire) == TIMER_CANCELLED
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        TimerHandle::new()
    }
}

/// 重传超时事件。到期时先认领，认领失败说明确认已先到。
pub struct RetransmissionTimeout {
    pub id: ConnId,
    pub handle: TimerHandle,
    /// 定时器挂上时的队首序列号，用于过期性复核。
    pub seq: u32,
}

impl Event for RetransmissionTimeout {
    fn execute(self: Box<Self>, sched: &mut Scheduler, world: &mut dyn World) {
        if !self.handle.try_fire() {
            trace!(id = self.id, seq = self.seq, "重传定时器已取消");
            return;
        }
        let Some(ep) = world.endpoint_mut(self.id) else {
            return;
        };
        ep.conn
            .on_retransmission_timeout(sched, &mut ep.chan, self.seq);
    }
}
