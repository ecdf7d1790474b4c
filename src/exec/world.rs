//! 宿主容器 trait
//!
//! 定义事件执行所需的宿主接口：按连接标识取出端点
//! （状态机 + 通道信箱），并在每个事件之后获得一次 on_tick。

use super::scheduler::Scheduler;
use crate::chan::{ConnId, Endpoint};

/// 宿主容器：由外层通道/事件循环实现（例如内存覆盖链路）。
pub trait World {
    /// 解析连接标识。连接已释放时返回 `None`，事件静默作废。
    fn endpoint_mut(&mut self, id: ConnId) -> Option<&mut Endpoint>;

    /// 每个事件执行完后调用一次（宿主借此泵出信箱里的出站帧）。
    fn on_tick(&mut self, _sched: &mut Scheduler) {}
}
