//! 连接状态
//!
//! RFC 9293 §3.3.2 状态集。TIME_WAIT 折叠为「2·MSL 等待后进入
//! CLOSED」，由调度的 MSL 到期事件驱动，不单列状态。

use serde::{Deserialize, Serialize};

/// 每条连接在任一时刻恰有一个状态；迁移只发生在状态机内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    Closing,
    CloseWait,
    LastAck,
}

impl State {
    /// 已完成序列号同步（握手之后的所有状态）。
    pub fn is_synchronized(self) -> bool {
        !matches!(self, State::Closed | State::Listen | State::SynSent)
    }

    /// 还能接受应用数据进入发送缓冲。
    pub fn can_accept_send(self) -> bool {
        matches!(
            self,
            State::Listen
                | State::SynSent
                | State::SynReceived
                | State::Established
                | State::CloseWait
        )
    }

    /// 还会接收并交付对端数据（本端尚未收到对端 FIN）。
    pub fn can_receive_data(self) -> bool {
        matches!(
            self,
            State::SynReceived | State::Established | State::FinWait1 | State::FinWait2
        )
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Closed => "CLOSED",
            State::Listen => "LISTEN",
            State::SynSent => "SYN_SENT",
            State::SynReceived => "SYN_RECEIVED",
            State::Established => "ESTABLISHED",
            State::FinWait1 => "FIN_WAIT_1",
            State::FinWait2 => "FIN_WAIT_2",
            State::Closing => "CLOSING",
            State::CloseWait => "CLOSE_WAIT",
            State::LastAck => "LAST_ACK",
        };
        f.write_str(name)
    }
}
