//! RTT 估计
//!
//! 基于 RFC 7323 时间戳回显测量往返时延，按本引擎固定的
//! α=0.8、β=1.3 平滑（非 RFC 6298 默认值，属实现选择），
//! 推导重传超时 `rto = clamp(sRtt + 4·rttVar, 1000, 60000)` 毫秒。

use crate::exec::Moment;
use crate::seg::{Segment, SegmentOption, serial};
use tracing::trace;

pub const RTO_LOWER_BOUND_MS: u64 = 1000;
pub const RTO_UPPER_BOUND_MS: u64 = 60_000;

/// 新样本的平滑权重。
const ALPHA: f64 = 0.8;
/// 方差因子。大于 1：新偏差被放大，方差项收敛更激进。
const BETA: f64 = 1.3;

#[derive(Debug)]
pub struct RttEstimator {
    /// 待回显给对端的最近时间戳（RFC 7323 §4 窗口规则维护）。
    ts_recent: u32,
    /// 最近一次随出站分段通告的确认号。
    last_ack_sent: u32,
    s_rtt: f64,
    rtt_var: f64,
    rto: u64,
    has_sample: bool,
}

impl Default for RttEstimator {
    fn default() -> RttEstimator {
        RttEstimator {
            ts_recent: 0,
            last_ack_sent: 0,
            s_rtt: 0.0,
            rtt_var: 0.0,
            rto: RTO_LOWER_BOUND_MS,
            has_sample: false,
        }
    }
}

impl RttEstimator {
    pub fn new() -> RttEstimator {
        RttEstimator::default()
    }

    /// 当前重传超时（毫秒）。
    pub fn rto(&self) -> u64 {
        self.rto
    }

    pub fn s_rtt_ms(&self) -> u64 {
        self.s_rtt.round() as u64
    }

    pub fn rtt_var_ms(&self) -> u64 {
        self.rtt_var.round() as u64
    }

    /// 入站分段的时间戳登记：仅当其序列范围覆盖
    /// `last_ack_sent`（即不是相对已发确认的陈旧分段）才更新
    /// `ts_recent`。
    pub fn note_inbound(&mut self, seg: &Segment) {
        let Some((ts_val, _)) = seg.timestamps() else {
            return;
        };
        if serial::less_than_or_equal(seg.seq, self.last_ack_sent)
            && serial::less_than_or_equal(self.last_ack_sent, seg.last_seq())
        {
            self.ts_recent = ts_val;
        }
    }

    /// 给出站分段盖时间戳并登记通告的确认号。
    pub fn stamp_outbound(&mut self, seg: &mut Segment, now: Moment) {
        seg.set_option(SegmentOption::Timestamps {
            ts_val: now.ts_val(),
            ts_ecr: self.ts_recent,
        });
        if seg.is_ack() {
            self.last_ack_sent = seg.ack;
        }
    }

    /// 对确认分段回显的时间戳取样并更新估计。
    pub fn on_ack(&mut self, now: Moment, seg: &Segment) {
        let Some((_, ts_ecr)) = seg.timestamps() else {
            return;
        };
        if ts_ecr == 0 {
            return;
        }
        let sample = now.ts_val().wrapping_sub(ts_ecr);
        // 回显落在未来或回卷过半 ⇒ 非本连接存活期的测量，丢弃
        if sample >= 1 << 31 {
            return;
        }
        self.add_sample(f64::from(sample));
    }

    fn add_sample(&mut self, sample: f64) {
        if self.has_sample {
            self.rtt_var = ((1.0 - BETA) * self.rtt_var + BETA * (self.s_rtt - sample).abs())
                .max(0.0);
            self.s_rtt = (1.0 - ALPHA) * self.s_rtt + ALPHA * sample;
        } else {
            self.s_rtt = sample;
            self.rtt_var = sample / 2.0;
            self.has_sample = true;
        }
        self.rto = ((self.s_rtt + 4.0 * self.rtt_var).round() as u64)
            .clamp(RTO_LOWER_BOUND_MS, RTO_UPPER_BOUND_MS);
        trace!(sample, s_rtt = self.s_rtt, rtt_var = self.rtt_var, rto = self.rto, "RTT 采样");
    }

    /// 重传超时触发后的指数退避（封顶 60 秒）。
    pub fn back_off(&mut self) {
        self.rto = (self.rto * 2).min(RTO_UPPER_BOUND_MS);
    }
}
