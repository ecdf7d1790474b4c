//! 连接配置
//!
//! 每条连接创建时拍下一份不可变快照，之后不再变化。
//! 可序列化，便于诊断输出与实验脚本复现。

use serde::{Deserialize, Serialize};

/// 连接配置值对象。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 主动发起握手（客户端）还是被动等待（监听端）。
    pub active_open: bool,
    /// 本端基准 MSS；有效值为 `min(base_mss, 对端通告)`。
    pub base_mss: u16,
    /// 接收内存预算（字节）。未被应用读走的字节占用该预算，
    /// 通告窗口 = 预算 − 未读字节。
    pub receive_budget: u32,
    /// 最大分段寿命（毫秒）。关闭方在最终 ACK 后等待 2·MSL
    /// 才释放连接。
    pub max_segment_lifetime_ms: u64,
    /// 用户超时（毫秒）：数据持续未获确认超过该时长则中止连接。
    pub user_timeout_ms: u64,
    /// 关闭发送聚合（Nagle）。
    pub no_delay: bool,
    /// 启用整帧校验和。
    pub checksum: bool,
    /// 启用 RFC 7323 时间戳选项（RTT 测量依赖它）。
    pub timestamps: bool,
    /// 固定初始发送序列号；`None` 时按连接标识派生。
    pub iss: Option<u32>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            active_open: false,
            base_mss: 1200,
            receive_budget: 64 * 1024,
            max_segment_lifetime_ms: 30_000,
            user_timeout_ms: 60_000,
            no_delay: false,
            checksum: true,
            timestamps: true,
            iss: None,
        }
    }
}
