//! 三级反馈调度器
//!
//! 预备线程按优先级落入三条队列：
//! - L1 (优先级 100–149)：最短作业优先，按突发估计排序；
//! - L2 (优先级 50–99)：静态优先级，按优先级排序；
//! - L3 (优先级 0–49)：轮转，先进先出。
//!
//! 这里的所有例程都假设中断已经关闭——单处理器上这就是互斥。
//! 不能用锁：等锁时若再进 `find_next_to_run`，就陷入死循环。
//!
//! 队列**拥有**其中的线程描述符；调度器只掌管队列成员关系，
//! 运行中的线程由内核上下文持有。
//!
//! 每次状态迁移向注入的追踪流写一行日志，一行一个事件。

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Write;

use crate::config::{AGING_BONUS, AGING_TICKS, DEMOTE_LIMIT_TICKS, LEVEL_GAP, PRIORITY_LIMIT};
use crate::interrupt::Interrupt;
use crate::thread::{Thread, ThreadStatus};

const TIER_RR: usize = 0;
const TIER_PRIORITY: usize = 1;
const TIER_SJF: usize = 2;

/// L1 的优先级下界
const L1_LOWER_BOUND: u32 = 2 * LEVEL_GAP;

fn cmp_id(t1: &Thread, t2: &Thread) -> Ordering {
    t1.id().cmp(&t2.id())
}

// 高优先级在前，同优先级小 id 在前
fn cmp_priority(t1: &Thread, t2: &Thread) -> Ordering {
    t2.priority()
        .cmp(&t1.priority())
        .then_with(|| cmp_id(t1, t2))
}

// 短突发估计在前，同估计小 id 在前
fn cmp_sjf(t1: &Thread, t2: &Thread) -> Ordering {
    t1.guess_cpu_burst()
        .total_cmp(&t2.guess_cpu_burst())
        .then_with(|| cmp_id(t1, t2))
}

/// `candidate` 是否应当抢占 `current`。
///
/// 双方都在 L1 时按最短作业优先比较，否则按优先级比较；
/// 平手一律小 id 胜出。
pub fn is_preempted(current: &Thread, candidate: &Thread) -> bool {
    if current.priority() >= L1_LOWER_BOUND && candidate.priority() >= L1_LOWER_BOUND {
        cmp_sjf(candidate, current) == Ordering::Less
    } else {
        cmp_priority(candidate, current) == Ordering::Less
    }
}

pub struct Scheduler {
    /// L3：先进先出
    rr_queue: Vec<Box<Thread>>,
    /// L2：按 (优先级降序, id) 全序
    priority_queue: Vec<Box<Thread>>,
    /// L1：按 (突发估计, id) 全序
    sjf_queue: Vec<Box<Thread>>,
    /// 下一次上下文切换之后需要回收的线程
    to_be_destroyed: Option<Box<Thread>>,
    /// 状态迁移追踪流
    trace: Box<dyn Write + Send>,
}

impl Scheduler {
    pub fn new(trace: Box<dyn Write + Send>) -> Self {
        Self {
            rr_queue: Vec::new(),
            priority_queue: Vec::new(),
            sjf_queue: Vec::new(),
            to_be_destroyed: None,
            trace,
        }
    }

    /// 线程进入预备状态，落入其层级对应的队列。
    ///
    /// `current` 是此刻占有 CPU 的线程；新线程能够抢占它时，
    /// 经让出闩锁请求一次中断返回路径上的切换。
    /// 让出路径重新入队自身时传入 `None`，不触发抢占检查。
    pub fn ready_to_run(
        &mut self,
        mut thread: Box<Thread>,
        current: Option<&Thread>,
        interrupt: &mut Interrupt,
        now: usize,
    ) -> usize {
        assert!(interrupt.is_off());
        assert!(thread.priority() < PRIORITY_LIMIT);
        log::debug!("putting thread on ready queue: {}", thread.name());

        thread.last_cpu_tick = now;
        let tier = thread.tier();

        let _ = writeln!(
            self.trace,
            "Tick {}: Thread {} is inserted into queue L{} (EST: {}, PRI: {})",
            now,
            thread.id(),
            3 - tier,
            thread.guess_cpu_burst(),
            thread.priority(),
        );

        thread.set_status(ThreadStatus::Ready);
        let preempt = current.is_some_and(|current| is_preempted(current, &thread));

        match tier {
            TIER_RR => self.rr_queue.push(thread),
            TIER_PRIORITY => insert_sorted(&mut self.priority_queue, thread, cmp_priority),
            TIER_SJF => insert_sorted(&mut self.sjf_queue, thread, cmp_sjf),
            _ => unreachable!("priority out of range"),
        }

        if preempt {
            interrupt.yield_on_return();
        }

        tier
    }

    /// 取出下一个该上 CPU 的线程：L1 → L2 → L3 中第一个非空
    /// 队列的队首。整个系统无预备线程时返回空，空转由外部负责。
    pub fn find_next_to_run(&mut self, interrupt: &Interrupt, now: usize) -> Option<Box<Thread>> {
        assert!(interrupt.is_off());

        let (level, thread) = if !self.sjf_queue.is_empty() {
            (1, self.sjf_queue.remove(0))
        } else if !self.priority_queue.is_empty() {
            (2, self.priority_queue.remove(0))
        } else if !self.rr_queue.is_empty() {
            (3, self.rr_queue.remove(0))
        } else {
            return None;
        };

        let _ = writeln!(
            self.trace,
            "Tick {}: Thread {} is removed from queue L{} (EST: {}, PRI: {})",
            now,
            thread.id(),
            level,
            thread.guess_cpu_burst(),
            thread.priority(),
        );

        Some(thread)
    }

    /// 老化：久候的预备线程获得优先级提升，防止饿死。
    ///
    /// 新优先级到达 [`LEVEL_GAP`] 的线程摘出重新入队
    /// (层级与抢占都重新评估)；仍留在 L3 深处的只重置等待窗口。
    /// 每条队列先扫出候选再统一改动，扫描不会被入队搅乱。
    pub fn aging(&mut self, current: Option<&Thread>, interrupt: &mut Interrupt, now: usize) {
        let promoted = Self::collect_aged(&mut self.rr_queue, self.trace.as_mut(), now);
        for thread in promoted {
            self.ready_to_run(thread, current, interrupt, now);
        }

        let promoted = Self::collect_aged(&mut self.priority_queue, self.trace.as_mut(), now);
        for thread in promoted {
            self.ready_to_run(thread, current, interrupt, now);
        }

        let promoted = Self::collect_aged(&mut self.sjf_queue, self.trace.as_mut(), now);
        for thread in promoted {
            self.ready_to_run(thread, current, interrupt, now);
        }
    }

    /// 降级：运行线程的连续突发超过阈值时结算突发、
    /// 压到下一层级的顶端，并请求让出。L3 的线程无处可降。
    pub fn demote(&mut self, current: &mut Thread, interrupt: &mut Interrupt, now: usize) {
        let burst = now - current.last_cpu_tick;
        if burst < DEMOTE_LIMIT_TICKS {
            return;
        }

        current.last_cpu_tick = now;
        current.cpu_burst += burst;

        let tier = current.tier();
        if tier > 0 {
            let old_priority = current.priority();
            current.set_priority(tier as u32 * LEVEL_GAP - 1);
            interrupt.yield_on_return();

            let _ = writeln!(
                self.trace,
                "Tick {}: Thread {} changes its priority from {} to {}",
                now,
                current.id(),
                old_priority,
                current.priority(),
            );
        }
    }

    /// 倾印轮转队列，调试用
    pub fn print(&self) {
        let ids: Vec<usize> = self.rr_queue.iter().map(|thread| thread.id()).collect();
        log::debug!("ready queue contents: {ids:?}");
    }

    pub(crate) fn stash_to_be_destroyed(&mut self, thread: Box<Thread>) {
        assert!(self.to_be_destroyed.is_none());
        self.to_be_destroyed = Some(thread);
    }

    pub(crate) fn take_to_be_destroyed(&mut self) -> Option<Box<Thread>> {
        self.to_be_destroyed.take()
    }
}

impl Scheduler {
    /// 单条队列的老化扫描：就地提升优先级并记录，
    /// 摘出需要重新入队的线程返回给调用方。
    fn collect_aged(
        queue: &mut Vec<Box<Thread>>,
        trace: &mut (dyn Write + Send),
        now: usize,
    ) -> Vec<Box<Thread>> {
        let mut promoted = Vec::new();

        let mut i = 0;
        while i < queue.len() {
            if now - queue[i].last_cpu_tick >= AGING_TICKS {
                let thread = &mut queue[i];
                let old_priority = thread.priority();
                let new_priority = (old_priority + AGING_BONUS).min(PRIORITY_LIMIT - 1);
                thread.set_priority(new_priority);

                let _ = writeln!(
                    trace,
                    "Tick {}: Thread {} changes its priority from {} to {}",
                    now,
                    thread.id(),
                    old_priority,
                    new_priority,
                );

                if new_priority >= LEVEL_GAP {
                    promoted.push(queue.remove(i));
                    continue;
                }
                // 不重新入队，等待窗口就地重开
                thread.last_cpu_tick = now;
            }
            i += 1;
        }

        promoted
    }
}

fn insert_sorted(
    queue: &mut Vec<Box<Thread>>,
    thread: Box<Thread>,
    cmp: fn(&Thread, &Thread) -> Ordering,
) {
    let position = queue.partition_point(|queued| cmp(queued, &thread) != Ordering::Greater);
    queue.insert(position, thread);
}
