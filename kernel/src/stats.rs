//! 虚拟时钟
//!
//! tick 不与真实时间挂钩，只在模拟事件处推进：
//! 时钟中断、指令推进等都由外部协作者折算成 tick 数。

#[derive(Debug, Default)]
pub struct Statistics {
    /// 开机以来经过的虚拟 tick 数，内核全程递增
    pub total_ticks: usize,
}

impl Statistics {
    pub const fn new() -> Self {
        Self { total_ticks: 0 }
    }

    #[inline]
    pub fn advance(&mut self, ticks: usize) {
        self.total_ticks += ticks;
    }
}
