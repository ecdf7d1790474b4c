use crate::conn::{ReceiveBuffer, SendBuffer};

#[test]
fn send_buffer_dequeues_in_order_and_in_chunks() {
    let mut buf = SendBuffer::new();
    buf.enqueue(b"hello ");
    buf.enqueue(b"world");
    assert_eq!(buf.len(), 11);
    assert_eq!(buf.dequeue_up_to(6), b"hello ");
    assert_eq!(buf.dequeue_up_to(100), b"world");
    assert!(buf.is_empty());
    assert_eq!(buf.dequeue_up_to(10), Vec::<u8>::new());
}

#[test]
fn send_buffer_clear_reports_dropped_bytes() {
    let mut buf = SendBuffer::new();
    buf.enqueue(&[0; 42]);
    assert_eq!(buf.clear(), 42);
    assert!(buf.is_empty());
}

#[test]
fn receive_buffer_supports_partial_consumption() {
    let mut buf = ReceiveBuffer::new();
    buf.append(b"abcde".to_vec());
    buf.append(b"fgh".to_vec());
    assert_eq!(buf.readable_bytes(), 8);
    assert_eq!(buf.consume(3), b"abc");
    assert_eq!(buf.readable_bytes(), 5);
    // 跨块读取
    assert_eq!(buf.consume(4), b"defg");
    assert_eq!(buf.consume(10), b"h");
    assert!(buf.is_empty());
    assert_eq!(buf.consume(1), Vec::<u8>::new());
}

#[test]
fn receive_buffer_releases_storage_block_by_block() {
    let mut buf = ReceiveBuffer::new();
    buf.append(vec![1; 4]);
    buf.append(vec![2; 4]);
    assert_eq!(buf.consume(4), vec![1; 4]);
    assert_eq!(buf.consume(4), vec![2; 4]);
    assert!(buf.is_empty());
}

#[test]
fn receive_buffer_clear_reports_dropped_bytes() {
    let mut buf = ReceiveBuffer::new();
    buf.append(vec![0; 7]);
    buf.consume(2);
    assert_eq!(buf.clear(), 5);
    assert_eq!(buf.readable_bytes(), 0);
}
