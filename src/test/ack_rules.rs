use crate::conn::{Config, Tcb};
use crate::seg::Segment;

fn tcb_with(snd_una: u32, snd_nxt: u32) -> Tcb {
    let mut tcb = Tcb::new(&Config::default(), snd_una);
    tcb.snd_nxt = snd_nxt;
    tcb
}

#[test]
fn ack_acceptable_only_inside_una_nxt_window() {
    let tcb = tcb_with(100, 200);
    assert!(tcb.is_acceptable_ack(150));
    assert!(tcb.is_acceptable_ack(101));
    assert!(tcb.is_acceptable_ack(200));
    assert!(!tcb.is_acceptable_ack(100));
    assert!(!tcb.is_acceptable_ack(201));
    assert!(!tcb.is_acceptable_ack(99));
}

#[test]
fn ack_acceptability_survives_wraparound() {
    let tcb = tcb_with(u32::MAX - 5, 10);
    assert!(tcb.is_acceptable_ack(0));
    assert!(tcb.is_acceptable_ack(u32::MAX));
    assert!(tcb.is_acceptable_ack(10));
    assert!(!tcb.is_acceptable_ack(u32::MAX - 5));
    assert!(!tcb.is_acceptable_ack(11));
}

fn window_probe(seq: u32, ack: u32, window: u32) -> Segment {
    let mut seg = Segment::ack(seq, ack);
    seg.window = window;
    seg
}

#[test]
fn stale_segment_cannot_shrink_send_window() {
    let mut tcb = tcb_with(100, 200);
    tcb.update_snd_wnd(&window_probe(1000, 150, 8000));
    assert_eq!(tcb.snd_wnd, 8000);
    assert_eq!(tcb.max_snd_wnd, 8000);

    // 更旧的 seq：窗口通告被拒绝
    tcb.update_snd_wnd(&window_probe(999, 160, 16));
    assert_eq!(tcb.snd_wnd, 8000);

    // 同 seq、更新的 ack：采纳
    tcb.update_snd_wnd(&window_probe(1000, 160, 500));
    assert_eq!(tcb.snd_wnd, 500);

    // 同 seq、更旧的 ack：拒绝
    tcb.update_snd_wnd(&window_probe(1000, 150, 9999));
    assert_eq!(tcb.snd_wnd, 500);

    // 更新的 seq：采纳
    tcb.update_snd_wnd(&window_probe(1001, 150, 64));
    assert_eq!(tcb.snd_wnd, 64);
    assert_eq!(tcb.max_snd_wnd, 8000);
}
