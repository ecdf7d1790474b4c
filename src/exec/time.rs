//! 协议时钟类型
//!
//! 定义协议时间及其单位转换。所有 RTO/RTT/时间戳均以毫秒为单位。

/// 协议时间（毫秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Moment(pub u64);

impl Moment {
    pub const ZERO: Moment = Moment(0);

    pub fn from_millis(ms: u64) -> Moment {
        Moment(ms)
    }

    pub fn from_secs(s: u64) -> Moment {
        Moment(s.saturating_mul(1_000))
    }

    /// 当前时间加上指定毫秒数。
    pub fn plus_millis(self, ms: u64) -> Moment {
        Moment(self.0.saturating_add(ms))
    }

    /// 自某个更早时刻起经过的毫秒数。
    pub fn millis_since(self, earlier: Moment) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// 低 32 位毫秒值，用作 Timestamps 选项里的 TSval/TSecr。
    pub fn ts_val(self) -> u32 {
        self.0 as u32
    }
}
