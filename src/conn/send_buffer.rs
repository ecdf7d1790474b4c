//! 发送缓冲
//!
//! 尚未分段发出的应用字节。入队即表示字节被引擎接收
//! （对应 send 调用的完成时机），之后由分段器按窗口切块取走。

use std::collections::VecDeque;

/// 有序字节队列。
#[derive(Debug, Default)]
pub struct SendBuffer {
    q: VecDeque<u8>,
}

impl SendBuffer {
    pub fn new() -> SendBuffer {
        SendBuffer::default()
    }

    /// 接收应用字节。
    pub fn enqueue(&mut self, bytes: &[u8]) {
        self.q.extend(bytes.iter().copied());
    }

    /// 取走至多 `max` 个字节（不足则全部取走）。
    pub fn dequeue_up_to(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.q.len());
        self.q.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// 中止时丢弃全部字节，返回丢弃数量。
    pub fn clear(&mut self) -> usize {
        let n = self.q.len();
        self.q.clear();
        n
    }
}
