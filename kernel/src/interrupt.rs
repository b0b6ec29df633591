//! 中断使能状态
//!
//! 单处理器上关中断即互斥：调度器与文件系统的每个修改性操作
//! 都运行在关中断区间内，入口处断言这一点。

use core::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntLevel {
    Off,
    On,
}

#[derive(Debug)]
pub struct Interrupt {
    level: IntLevel,
    /// 让出闩锁：中断处理期间置位，由中断返回路径消费，
    /// 使返回用户态之前先发生一次上下文切换
    yield_on_return: bool,
}

impl Interrupt {
    pub const fn new() -> Self {
        Self {
            level: IntLevel::On,
            yield_on_return: false,
        }
    }

    /// 切换中断使能，返回旧状态
    pub fn set_level(&mut self, level: IntLevel) -> IntLevel {
        mem::replace(&mut self.level, level)
    }

    #[inline]
    pub fn level(&self) -> IntLevel {
        self.level
    }

    #[inline]
    pub fn is_off(&self) -> bool {
        self.level == IntLevel::Off
    }

    /// 请求在中断返回路径上让出 CPU
    pub fn yield_on_return(&mut self) {
        assert!(self.is_off());
        self.yield_on_return = true;
    }

    /// 消费让出闩锁
    pub fn take_yield_request(&mut self) -> bool {
        mem::replace(&mut self.yield_on_return, false)
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
