//! 执行上下文核心模块
//!
//! 此模块包含每连接串行执行所需的核心组件：协议时钟、事件、
//! 调度器、完成信号与宿主容器。

// 子模块声明
mod event;
mod promise;
mod scheduled_event;
mod scheduler;
mod time;
mod world;

// 重新导出公共接口
pub use event::Event;
pub use promise::{Promise, PromiseState};
pub use scheduled_event::ScheduledEvent;
pub use scheduler::Scheduler;
pub use time::Moment;
pub use world::World;
