//! 内核上下文
//!
//! 调度器、文件系统、中断状态与虚拟时钟是进程级单例，
//! 开机建立、停机拆除。它们统一装进 [`Kernel`] 记录，
//! 由每个系统调用与中断处理例程显式传递——不设环境全局量，
//! 测试装具可以并存任意多个内核实例。

use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::sync::Arc;
use core::fmt::Write;
use core::mem;

use block_dev::BlockDevice;
use sector_fs::SectorFileSystem;

use crate::config::TIMER_TICKS;
use crate::interrupt::{IntLevel, Interrupt};
use crate::scheduler::Scheduler;
use crate::stats::Statistics;
use crate::thread::{Thread, ThreadStatus};

pub struct Kernel {
    pub stats: Statistics,
    pub interrupt: Interrupt,
    pub scheduler: Scheduler,
    pub file_system: SectorFileSystem,
    /// 此刻占有 CPU 的线程
    current: Box<Thread>,
    tids: TidAllocator,
    pub(crate) console: Box<dyn Write + Send>,
    halted: bool,
}

impl Kernel {
    /// 开机：建立主线程并格式化或挂载磁盘。
    /// `trace` 接收调度器的状态迁移日志，`console` 接收用户可见输出。
    pub fn new(
        device: Arc<dyn BlockDevice>,
        format: bool,
        trace: Box<dyn Write + Send>,
        console: Box<dyn Write + Send>,
    ) -> Self {
        let mut tids = TidAllocator::new();
        let mut main = Box::new(Thread::new(tids.alloc(), "main", 0));
        main.set_status(ThreadStatus::Running);

        let file_system = if format {
            SectorFileSystem::format(device)
        } else {
            SectorFileSystem::mount(device)
        };

        Self {
            stats: Statistics::new(),
            interrupt: Interrupt::new(),
            scheduler: Scheduler::new(trace),
            file_system,
            current: main,
            tids,
            console,
            halted: false,
        }
    }

    #[inline]
    pub fn current_thread(&self) -> &Thread {
        &self.current
    }

    /// 铸造一个新线程描述符，id 取自回收分配器。
    /// 调用方配置完(优先级画像、地址空间)后经 [`ready_to_run`](Self::ready_to_run) 投运。
    pub fn new_thread(&mut self, name: &str, priority: u32) -> Box<Thread> {
        Box::new(Thread::new(self.tids.alloc(), name, priority))
    }

    /// 投运新线程或唤醒阻塞线程：关中断入队，带抢占检查
    pub fn ready_to_run(&mut self, thread: Box<Thread>) {
        let old_level = self.interrupt.set_level(IntLevel::Off);
        let now = self.stats.total_ticks;
        self.scheduler
            .ready_to_run(thread, Some(&self.current), &mut self.interrupt, now);
        self.interrupt.set_level(old_level);
    }

    /// 当前线程主动让出 CPU。
    ///
    /// 先取后继再重新入队自身——自身不会被选中，
    /// 也不触发针对自己的抢占检查。没有后继时原地继续运行。
    pub fn yield_current(&mut self) {
        let old_level = self.interrupt.set_level(IntLevel::Off);
        let now = self.stats.total_ticks;

        if let Some(mut next) = self.scheduler.find_next_to_run(&self.interrupt, now) {
            log::debug!("switching from {} to {}", self.current.name(), next.name());

            next.set_status(ThreadStatus::Running);
            next.last_cpu_tick = now;

            let mut old = mem::replace(&mut self.current, next);
            old.finish_burst(now);
            old.save_user_state();
            old.check_overflow();
            self.scheduler
                .ready_to_run(old, None, &mut self.interrupt, now);

            self.switch_tail();
        }

        self.interrupt.set_level(old_level);
    }

    /// 当前线程进入阻塞，描述符交还调用方的等待结构保管。
    ///
    /// 没有后继线程时返回 `None` 且不发生阻塞——
    /// 空转等待是外部协作者的职责。
    pub fn block_current(&mut self) -> Option<Box<Thread>> {
        assert!(self.interrupt.is_off());
        let now = self.stats.total_ticks;

        let mut next = self.scheduler.find_next_to_run(&self.interrupt, now)?;
        log::debug!("blocking {}, switching to {}", self.current.name(), next.name());

        next.set_status(ThreadStatus::Running);
        next.last_cpu_tick = now;

        let mut old = mem::replace(&mut self.current, next);
        old.finish_burst(now);
        old.set_status(ThreadStatus::Blocked);
        old.save_user_state();
        old.check_overflow();

        self.switch_tail();
        Some(old)
    }

    /// 当前线程终结。尸体停进待销毁槽位，在后继线程的栈上回收
    /// ——直到切换完成之前，我们都还运行在它的栈上。
    /// 没有后继时返回 `false`，停机与否由调用方决定。
    pub fn finish_current(&mut self) -> bool {
        let old_level = self.interrupt.set_level(IntLevel::Off);
        let now = self.stats.total_ticks;

        let Some(mut next) = self.scheduler.find_next_to_run(&self.interrupt, now) else {
            self.interrupt.set_level(old_level);
            return false;
        };
        log::debug!("finishing thread: {}", self.current.name());

        next.set_status(ThreadStatus::Running);
        next.last_cpu_tick = now;

        let mut old = mem::replace(&mut self.current, next);
        old.set_status(ThreadStatus::Zombie);
        old.save_user_state();
        old.check_overflow();
        self.scheduler.stash_to_be_destroyed(old);

        self.switch_tail();

        self.interrupt.set_level(old_level);
        true
    }

    /// 时钟中断：推进虚拟时钟，老化预备线程，再检查运行线程
    /// 是否该降级；返回路径消费让出闩锁。
    pub fn timer_interrupt(&mut self) {
        let old_level = self.interrupt.set_level(IntLevel::Off);

        self.stats.advance(TIMER_TICKS);
        let now = self.stats.total_ticks;

        self.scheduler
            .aging(Some(&self.current), &mut self.interrupt, now);
        self.scheduler
            .demote(&mut self.current, &mut self.interrupt, now);

        // 中断返回路径
        if self.interrupt.take_yield_request() {
            self.yield_current();
        }

        self.interrupt.set_level(old_level);
    }

    /// 在模拟事件处推进虚拟时钟
    #[inline]
    pub fn tick(&mut self, ticks: usize) {
        self.stats.advance(ticks);
    }

    /// 停机：落盘并停止接受工作
    pub fn halt(&mut self) {
        log::info!("machine halting, total ticks: {}", self.stats.total_ticks);
        self.file_system.sync();
        self.halted = true;
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl Kernel {
    /// SWITCH 返回之后的收尾，运行在刚上台线程的栈上：
    /// 回收待销毁的前任，恢复自己的用户态。
    fn switch_tail(&mut self) {
        if let Some(dead) = self.scheduler.take_to_be_destroyed() {
            log::debug!("destroying thread: {}", dead.name());
            self.tids.free(dead.id());
        }
        self.current.restore_user_state();
    }
}

/// 线程 id 簿记。
///
/// 死线程的 id 回到空闲集合，分配时小号优先——id 参与调度器
/// 全序的平局裁决，小号优先让复用后的裁决依旧可预测。
struct TidAllocator {
    /// 尚未发出过的最小 id
    next_fresh: usize,
    /// 已回收、可复用的 id
    freed: BTreeSet<usize>,
}

impl TidAllocator {
    const fn new() -> Self {
        Self {
            next_fresh: 0,
            freed: BTreeSet::new(),
        }
    }

    fn alloc(&mut self) -> usize {
        if let Some(tid) = self.freed.pop_first() {
            return tid;
        }

        let tid = self.next_fresh;
        self.next_fresh += 1;
        tid
    }

    fn free(&mut self, tid: usize) {
        assert!(tid < self.next_fresh, "tid {tid} was never handed out");
        assert!(self.freed.insert(tid), "tid {tid} freed twice");
    }
}
