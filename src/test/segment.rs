use crate::conn::OutgoingSegmentQueue;
use crate::seg::{ACK, FIN, Segment, serial};

#[test]
fn seq_len_counts_syn_and_fin() {
    assert_eq!(Segment::syn(100).seq_len(), 1);
    assert_eq!(Segment::fin(100).seq_len(), 1);
    assert_eq!(Segment::ack(100, 200).seq_len(), 0);
    assert_eq!(Segment::data(100, 200, vec![0; 5]).seq_len(), 5);
    let mut fin_with_data = Segment::data(100, 200, vec![0; 5]);
    fin_with_data.ctl |= FIN;
    assert_eq!(fin_with_data.seq_len(), 6);
}

#[test]
fn last_seq_wraps_with_payload() {
    assert_eq!(Segment::ack(7, 0).last_seq(), 7);
    assert_eq!(Segment::data(100, 0, vec![0; 5]).last_seq(), 104);
    let near_wrap = Segment::data(u32::MAX - 1, 0, vec![0; 4]);
    assert_eq!(near_wrap.last_seq(), serial::add(u32::MAX - 1, 3));
    assert_eq!(near_wrap.last_seq(), 1);
}

#[test]
fn pure_ack_and_rst_need_no_acknowledgement() {
    assert!(!Segment::ack(1, 2).must_be_acked());
    assert!(!Segment::rst(1).must_be_acked());
    assert!(Segment::syn(1).must_be_acked());
    assert!(Segment::fin(1).must_be_acked());
    assert!(Segment::data(1, 2, vec![9]).must_be_acked());
}

#[test]
fn set_option_replaces_same_kind() {
    use crate::seg::SegmentOption;
    let mut seg = Segment::syn(1);
    seg.set_option(SegmentOption::MaximumSegmentSize(1200));
    seg.set_option(SegmentOption::MaximumSegmentSize(400));
    assert_eq!(seg.options().len(), 1);
    assert_eq!(seg.mss_option(), Some(400));
}

#[test]
fn pure_ack_then_fin_merge_into_one_frame() {
    let mut q = OutgoingSegmentQueue::new();
    q.push(Segment::ack(10, 42));
    q.push(Segment::fin(10));
    let frames: Vec<Segment> = q.drain().collect();
    assert_eq!(frames.len(), 1);
    let merged = &frames[0];
    assert!(merged.is_fin());
    assert!(merged.is_ack());
    assert_eq!(merged.seq, 10);
    assert_eq!(merged.ack, 42);
}

#[test]
fn newer_ack_supersedes_older_pure_ack() {
    let mut q = OutgoingSegmentQueue::new();
    q.push(Segment::ack(10, 42));
    q.push(Segment::ack(10, 45));
    let frames: Vec<Segment> = q.drain().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].ack, 45);
    assert_eq!(frames[0].ctl, ACK);
}

#[test]
fn data_segment_absorbs_queued_pure_ack() {
    let mut q = OutgoingSegmentQueue::new();
    q.push(Segment::ack(10, 42));
    q.push(Segment::data(10, 42, vec![1, 2, 3]));
    let frames: Vec<Segment> = q.drain().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload, vec![1, 2, 3]);
    assert!(frames[0].is_ack());
}

#[test]
fn different_seq_is_never_merged() {
    let mut q = OutgoingSegmentQueue::new();
    q.push(Segment::ack(10, 42));
    q.push(Segment::fin(11));
    assert_eq!(q.len(), 2);
}

#[test]
fn data_segment_is_not_absorbed() {
    // 载荷分段携带 ACK 之外的新信息，不允许被吞并
    let mut q = OutgoingSegmentQueue::new();
    q.push(Segment::data(10, 42, vec![1]));
    q.push(Segment::ack(10, 43));
    assert_eq!(q.len(), 2);
}
