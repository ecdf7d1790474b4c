//! 序列号空间算术
//!
//! seq/ack 全部落在模 2^32 的序列号空间里（RFC 1982 语义）：
//! `a < b` 当且仅当 `(b - a) mod 2^32` 落在 `(0, 2^31)` 区间。
//! 整个引擎里所有 seq/ack 的比较与加减必须走这里，临近回绕时
//! 直接用整数比较是错误的。

/// 半空间大小。差值恰好等于它时比较无定义（RFC 1982 的歧义点）。
const HALF_SPACE: u32 = 1 << 31;

/// 模 2^32 加法。
pub fn add(s: u32, n: u32) -> u32 {
    s.wrapping_add(n)
}

/// 模 2^32 减法，返回 `(a - b) mod 2^32`。
pub fn sub(a: u32, b: u32) -> u32 {
    a.wrapping_sub(b)
}

/// `a < b`（序列号序）。
pub fn less_than(a: u32, b: u32) -> bool {
    let d = b.wrapping_sub(a);
    d != 0 && d < HALF_SPACE
}

/// `a <= b`（序列号序）。
pub fn less_than_or_equal(a: u32, b: u32) -> bool {
    a == b || less_than(a, b)
}

/// `a > b`（序列号序）。
pub fn greater_than(a: u32, b: u32) -> bool {
    less_than(b, a)
}

/// `a >= b`（序列号序）。
pub fn greater_than_or_equal(a: u32, b: u32) -> bool {
    a == b || greater_than(a, b)
}
