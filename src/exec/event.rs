//! 事件 trait
//!
//! 定义连接执行上下文的事件接口。入站帧、用户调用与定时器触发
//! 都作为事件在同一个队列上串行执行。

use super::scheduler::Scheduler;
use super::world::World;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sched: &mut Scheduler, world: &mut dyn World);
}
