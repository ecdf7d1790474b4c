//! 协议核心：配置、错误分类、状态机、TCB 与各子组件。

mod config;
mod error;
mod machine;
mod outgoing;
mod receive_buffer;
mod retransmission;
mod rtt;
mod send_buffer;
mod state;
mod tcb;

pub use config::Config;
pub use error::TransportError;
pub use machine::{Connection, MslExpired, UserTimeoutExpired, ZeroWindowProbe};
pub use outgoing::OutgoingSegmentQueue;
pub use receive_buffer::ReceiveBuffer;
pub use retransmission::{Inflight, RetransmissionQueue, RetransmissionTimeout, TimerHandle};
pub use rtt::{RTO_LOWER_BOUND_MS, RTO_UPPER_BOUND_MS, RttEstimator};
pub use send_buffer::SendBuffer;
pub use state::State;
pub use tcb::{Tcb, TcbSnapshot};
