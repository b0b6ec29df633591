//! 线程描述符
//!
//! 描述符在任一时刻只被一个部件独占：正在 CPU 上运行、
//! 挂在某个预备队列里、躺在调用方的等待结构中，
//! 或者停在调度器的待销毁槽位上。归属即状态，不用共享指针建模。

use alloc::boxed::Box;
use alloc::string::String;
use alloc::string::ToString;
use core::fmt;

use crate::config::{LEVEL_GAP, PRIORITY_LIMIT, STACK_MAGIC};

/// 地址空间钩子。
///
/// 线程经由 `space` 字段**拥有**它的地址空间；
/// 地址空间若需要找回线程，只能做只读反查，不得持有所有权，
/// 环引用由此断开。
pub trait AddressSpace: Send {
    /// 保存用户态寄存器与页表状态
    fn save_state(&mut self);
    /// 恢复用户态寄存器与页表状态
    fn restore_state(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    New,
    Ready,
    Running,
    Blocked,
    Zombie,
}

pub struct Thread {
    id: usize,
    name: String,
    priority: u32,
    status: ThreadStatus,
    /// 最近一次获得或让出 CPU 的时刻，老化与降级都以它起算
    pub(crate) last_cpu_tick: usize,
    /// 自上次突发估计更新以来累计的 CPU 占用
    pub(crate) cpu_burst: usize,
    /// 突发时长的指数平均估计，最短作业优先排序的键
    guess_cpu_burst: f64,
    stack_magic: u32,
    space: Option<Box<dyn AddressSpace>>,
}

impl Thread {
    pub(crate) fn new(id: usize, name: &str, priority: u32) -> Self {
        assert!(priority < PRIORITY_LIMIT);

        Self {
            id,
            name: name.to_string(),
            priority,
            status: ThreadStatus::New,
            last_cpu_tick: 0,
            cpu_burst: 0,
            guess_cpu_burst: 0.0,
            stack_magic: STACK_MAGIC,
            space: None,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: u32) {
        assert!(priority < PRIORITY_LIMIT);
        self.priority = priority;
    }

    #[inline]
    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    #[inline]
    pub(crate) fn set_status(&mut self, status: ThreadStatus) {
        self.status = status;
    }

    #[inline]
    pub fn guess_cpu_burst(&self) -> f64 {
        self.guess_cpu_burst
    }

    /// 预置突发估计，用于从历史画像投放线程
    pub fn set_guess_cpu_burst(&mut self, guess: f64) {
        self.guess_cpu_burst = guess;
    }

    /// 调度层级，`优先级 / LEVEL_GAP`
    #[inline]
    pub fn tier(&self) -> usize {
        (self.priority / LEVEL_GAP) as usize
    }

    pub fn attach_space(&mut self, space: Box<dyn AddressSpace>) {
        self.space = Some(space);
    }

    pub(crate) fn save_user_state(&mut self) {
        if let Some(space) = self.space.as_mut() {
            space.save_state();
        }
    }

    pub(crate) fn restore_user_state(&mut self) {
        if let Some(space) = self.space.as_mut() {
            space.restore_state();
        }
    }

    /// 栈底哨兵仍完好才算没有溢出
    pub(crate) fn check_overflow(&self) {
        assert_eq!(
            self.stack_magic, STACK_MAGIC,
            "thread {} overflowed its stack",
            self.name
        );
    }

    /// 在让出点结算本轮突发并更新指数平均估计
    pub(crate) fn finish_burst(&mut self, now: usize) {
        let burst = self.cpu_burst + (now - self.last_cpu_tick);
        self.guess_cpu_burst = 0.5 * burst as f64 + 0.5 * self.guess_cpu_burst;
        self.cpu_burst = 0;
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("guess_cpu_burst", &self.guess_cpu_burst)
            .finish()
    }
}
