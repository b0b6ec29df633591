//! 调度器的配置常量

/// 相邻调度层级之间的优先级跨度；`优先级 / LEVEL_GAP` 即层级
pub const LEVEL_GAP: u32 = 50;
/// 优先级合法区间为 `[0, PRIORITY_LIMIT)`
pub const PRIORITY_LIMIT: u32 = 150;

/// 离开 CPU 满这么多 tick 的预备线程获得一次优先级提升
pub const AGING_TICKS: usize = 1500;
/// 每次老化提升的优先级幅度
pub const AGING_BONUS: u32 = 10;

/// 连续占用 CPU 达到此阈值的运行线程被降级
pub const DEMOTE_LIMIT_TICKS: usize = 500;

/// 每次时钟中断推进的虚拟 tick 数
pub const TIMER_TICKS: usize = 100;

/// 栈底哨兵值，被改写说明线程栈溢出
pub const STACK_MAGIC: u32 = 0xdeadbeef;
