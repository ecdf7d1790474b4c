//! 完成信号
//!
//! 写入/确认/关闭等异步操作的完成信号，具有三个可观察状态：
//! pending / fulfilled / failed(cause)。状态迁移通过一次性的
//! compare-exchange 认领完成，fulfil 与 fail 互斥，先提交者生效。

use crate::conn::TransportError;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

const PENDING: u8 = 0;
const FULFILLED: u8 = 1;
const FAILED: u8 = 2;

/// 完成信号的可观察状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Failed(TransportError),
}

struct Inner {
    state: AtomicU8,
    cause: OnceLock<TransportError>,
}

/// 可克隆的完成信号句柄。
#[derive(Clone)]
pub struct Promise(Arc<Inner>);

impl Promise {
    pub fn new() -> Promise {
        Promise(Arc::new(Inner {
            state: AtomicU8::new(PENDING),
            cause: OnceLock::new(),
        }))
    }

    /// 已完成的信号（例如 send 在入队即告完成时使用）。
    pub fn fulfilled() -> Promise {
        let p = Promise::new();
        p.try_fulfill();
        p
    }

    /// 已失败的信号。
    pub fn failed(cause: TransportError) -> Promise {
        let p = Promise::new();
        p.try_fail(cause);
        p
    }

    /// 认领成功。返回是否由本次调用提交。
    pub fn try_fulfill(&self) -> bool {
        self.0
            .state
            .compare_exchange(PENDING, FULFILLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 认领失败并记录原因。返回是否由本次调用提交。
    pub fn try_fail(&self, cause: TransportError) -> bool {
        // 先放原因，再迁移状态；若认领失败该原因不会被观察到。
        let _ = self.0.cause.set(cause);
        self.0
            .state
            .compare_exchange(PENDING, FAILED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn state(&self) -> PromiseState {
        match self.0.state.load(Ordering::Acquire) {
            FULFILLED => PromiseState::Fulfilled,
            FAILED => PromiseState::Failed(
                self.0
                    .cause
                    .get()
                    .cloned()
                    .unwrap_or(TransportError::Aborted),
            ),
            _ => PromiseState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.0.state.load(Ordering::Acquire) == PENDING
    }

    pub fn is_fulfilled(&self) -> bool {
        self.0.state.load(Ordering::Acquire) == FULFILLED
    }

    pub fn is_failed(&self) -> bool {
        self.0.state.load(Ordering::Acquire) == FAILED
    }
}

impl Default for Promise {
    fn default() -> Self {
        Promise::new()
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Promise({:?})", self.state())
    }
}
