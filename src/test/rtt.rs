use crate::conn::{RTO_LOWER_BOUND_MS, RTO_UPPER_BOUND_MS, RttEstimator};
use crate::exec::Moment;
use crate::seg::{Segment, SegmentOption};

fn ack_with_ecr(ts_ecr: u32) -> Segment {
    let mut seg = Segment::ack(1, 1);
    seg.set_option(SegmentOption::Timestamps { ts_val: 0, ts_ecr });
    seg
}

#[test]
fn first_sample_initialises_estimate() {
    let mut rtt = RttEstimator::new();
    assert_eq!(rtt.rto(), RTO_LOWER_BOUND_MS);
    // sample = 250 - 50 = 200ms
    rtt.on_ack(Moment::from_millis(250), &ack_with_ecr(50));
    assert_eq!(rtt.s_rtt_ms(), 200);
    assert_eq!(rtt.rtt_var_ms(), 100);
    // 200 + 4·100 = 600，夹到下限
    assert_eq!(rtt.rto(), RTO_LOWER_BOUND_MS);
}

#[test]
fn smoothing_uses_engine_constants() {
    let mut rtt = RttEstimator::new();
    rtt.on_ack(Moment::from_millis(250), &ack_with_ecr(50)); // 200ms
    rtt.on_ack(Moment::from_millis(900), &ack_with_ecr(500)); // 400ms
    // rttVar = -0.3·100 + 1.3·|200-400| = 230
    // sRtt   = 0.2·200 + 0.8·400 = 360
    assert_eq!(rtt.s_rtt_ms(), 360);
    assert_eq!(rtt.rtt_var_ms(), 230);
    assert_eq!(rtt.rto(), 360 + 4 * 230);
}

#[test]
fn zero_echo_and_future_echo_are_ignored() {
    let mut rtt = RttEstimator::new();
    rtt.on_ack(Moment::from_millis(250), &ack_with_ecr(0));
    rtt.on_ack(Moment::from_millis(250), &ack_with_ecr(300));
    assert_eq!(rtt.s_rtt_ms(), 0);
    assert_eq!(rtt.rto(), RTO_LOWER_BOUND_MS);
}

#[test]
fn backoff_doubles_up_to_upper_bound() {
    let mut rtt = RttEstimator::new();
    rtt.back_off();
    assert_eq!(rtt.rto(), 2000);
    for _ in 0..10 {
        rtt.back_off();
    }
    assert_eq!(rtt.rto(), RTO_UPPER_BOUND_MS);
}

#[test]
fn ts_recent_follows_rfc7323_window_rule() {
    let mut rtt = RttEstimator::new();
    // 通告 ack=100 之后，覆盖 100 的分段才更新 ts_recent
    let mut probe = Segment::ack(1, 100);
    rtt.stamp_outbound(&mut probe, Moment::from_millis(5));

    let mut stale = Segment::data(90, 1, vec![0; 5]); // 覆盖 90..=94
    stale.set_option(SegmentOption::Timestamps {
        ts_val: 111,
        ts_ecr: 0,
    });
    rtt.note_inbound(&stale);

    let mut out = Segment::ack(1, 100);
    rtt.stamp_outbound(&mut out, Moment::from_millis(6));
    assert_eq!(out.timestamps(), Some((6, 0)));

    let mut fresh = Segment::data(100, 1, vec![0; 5]); // 覆盖 100..=104
    fresh.set_option(SegmentOption::Timestamps {
        ts_val: 222,
        ts_ecr: 0,
    });
    rtt.note_inbound(&fresh);

    let mut out = Segment::ack(1, 105);
    rtt.stamp_outbound(&mut out, Moment::from_millis(7));
    assert_eq!(out.timestamps(), Some((7, 222)));
}
