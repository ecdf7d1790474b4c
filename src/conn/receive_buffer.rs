//! 接收缓冲
//!
//! 已按序收下、等待应用读取的字节。调用方保证追加的字节与
//! `rcv_nxt` 连续（乱序重组不在本实现范围内）。按块存放，
//! 块被完全消费后立即释放。

use std::collections::VecDeque;

/// 按序字节的合并队列，支持部分消费。
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    chunks: VecDeque<Vec<u8>>,
    /// 首块内已消费的偏移。
    head: usize,
    readable: usize,
}

impl ReceiveBuffer {
    pub fn new() -> ReceiveBuffer {
        ReceiveBuffer::default()
    }

    /// 追加一段按序字节。
    pub fn append(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.readable += bytes.len();
        self.chunks.push_back(bytes);
    }

    /// 向应用交付至多 `max` 个可读字节。
    pub fn consume(&mut self, max: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(max.min(self.readable));
        while out.len() < max {
            let Some(front) = self.chunks.front() else {
                break;
            };
            let avail = front.len() - self.head;
            let want = (max - out.len()).min(avail);
            out.extend_from_slice(&front[self.head..self.head + want]);
            self.head += want;
            if self.head == front.len() {
                self.chunks.pop_front();
                self.head = 0;
            }
        }
        self.readable -= out.len();
        out
    }

    pub fn readable_bytes(&self) -> usize {
        self.readable
    }

    pub fn is_empty(&self) -> bool {
        self.readable == 0
    }

    /// 关闭/中止时丢弃未交付字节，返回丢弃数量。
    pub fn clear(&mut self) -> usize {
        let n = self.readable;
        self.chunks.clear();
        self.head = 0;
        self.readable = 0;
        n
    }
}
