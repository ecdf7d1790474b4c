//! 调度器
//!
//! 每个连接的执行上下文：维护当前时间与事件队列。入站分段、
//! 用户调用与定时器触发在这里被串行化，互不交叠。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::Moment;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, trace};

/// 截止时间有序的事件循环：维护当前时间与事件队列。
#[derive(Default)]
pub struct Scheduler {
    now: Moment,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl Scheduler {
    /// 获取当前协议时间
    pub fn now(&self) -> Moment {
        self.now
    }

    /// 调度事件在指定时间执行
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: Moment, ev: E) {
        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });
    }

    /// 调度事件在 `delay_ms` 毫秒后执行
    pub fn schedule_after<E: Event>(&mut self, delay_ms: u64, ev: E) {
        self.schedule(self.now.plus_millis(delay_ms), ev);
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: Moment, world: &mut dyn World) {
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let item = self.q.pop().expect("peek then pop");
            self.now = item.at;
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    pub fn run(&mut self, world: &mut dyn World) {
        let mut event_count = 0u64;
        while let Some(item) = self.q.pop() {
            event_count += 1;
            self.now = item.at;

            trace!(
                event_num = event_count,
                now = ?self.now,
                seq = item.seq,
                remaining_queue = self.q.len(),
                "执行事件"
            );

            item.ev.execute(self, world);
            world.on_tick(self);
        }

        debug!(total_events = event_count, final_time = ?self.now, "事件队列耗尽");
    }
}
