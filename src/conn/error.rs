//! 连接级错误分类
//!
//! 面向应用层的失败原因。协议内部的异常（坏校验和、过期 ACK、
//! 窗口外分段）在引擎内部就地消化，永远不会出现在这里。

use thiserror::Error;

/// 连接中止 / 操作失败的类型化原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 对端拒绝建立连接（握手阶段收到 RST）。
    #[error("connection refused")]
    Refused,
    /// 对端复位了已同步的连接。
    #[error("connection reset by peer")]
    Reset,
    /// 连接正在关闭，不再接受该操作。
    #[error("connection is closing")]
    Closing,
    /// 连接已关闭。
    #[error("connection closed")]
    Closed,
    /// 用户超时到期，未确认的数据被放弃。
    #[error("user timeout expired")]
    UserTimeout,
    /// 本端主动中止。
    #[error("connection aborted")]
    Aborted,
}
