mod common;

use std::sync::{Arc, Mutex};

use common::boot;
use kernel::{is_preempted, AddressSpace, IntLevel, ThreadStatus};

#[test]
fn l1_preemption_prefers_shorter_estimate() {
    let (mut kernel, trace, _) = boot();

    let mut t1 = kernel.new_thread("t1", 120);
    t1.set_guess_cpu_burst(100.0);
    let mut t2 = kernel.new_thread("t2", 120);
    t2.set_guess_cpu_burst(10.0);
    let (id1, id2) = (t1.id(), t2.id());

    // 同在 L1:短突发估计胜出,平手小 id 胜出
    assert!(is_preempted(&t1, &t2));
    assert!(!is_preempted(&t2, &t1));

    kernel.ready_to_run(t1);
    kernel.ready_to_run(t2);

    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), id2);
    assert!(trace
        .contents()
        .contains(&format!("Thread {id2} is removed from queue L1")));
    assert_ne!(kernel.current_thread().id(), id1);
}

#[test]
fn ready_to_run_raises_yield_latch() {
    let (mut kernel, _, _) = boot();

    let high = kernel.new_thread("high", 80);
    let id = high.id();
    kernel.ready_to_run(high);

    // 让出闩锁在中断返回路径上兑现
    kernel.timer_interrupt();
    assert_eq!(kernel.current_thread().id(), id);
}

#[test]
fn equal_priority_does_not_preempt() {
    let (mut kernel, _, _) = boot();

    let peer = kernel.new_thread("peer", 0);
    kernel.ready_to_run(peer);

    kernel.timer_interrupt();
    assert_eq!(kernel.current_thread().id(), 0);
}

#[test]
fn yield_round_robin_is_fifo() {
    let (mut kernel, _, _) = boot();

    let a = kernel.new_thread("a", 0);
    let b = kernel.new_thread("b", 0);
    let (ida, idb) = (a.id(), b.id());
    kernel.ready_to_run(a);
    kernel.ready_to_run(b);

    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), ida);
    kernel.scheduler.print();
    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), idb);
    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), 0);
}

#[test]
fn empty_system_yield_keeps_running() {
    let (mut kernel, trace, _) = boot();

    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), 0);
    assert_eq!(trace.contents(), "");
}

#[test]
fn aging_promotes_across_tier() {
    let (mut kernel, trace, _) = boot();

    let tc = kernel.new_thread("tc", 45);
    let id = tc.id();
    kernel.ready_to_run(tc);

    kernel.tick(1500);
    kernel.timer_interrupt();

    let trace = trace.contents();
    assert!(trace.contains(&format!(
        "Tick 1600: Thread {id} changes its priority from 45 to 55"
    )));
    // 跨过层级边界:摘出轮转队列,重新落入 L2
    assert!(trace.contains(&format!(
        "Thread {id} is inserted into queue L2 (EST: 0, PRI: 55)"
    )));
    // 新优先级高过当前线程,中断返回路径随即切换
    assert_eq!(kernel.current_thread().id(), id);
}

#[test]
fn aging_below_boundary_stays_put() {
    let (mut kernel, trace, _) = boot();

    // 优先级 30 的新线程抢过主线程,主线程落回 L3 队列等待
    let t = kernel.new_thread("t", 30);
    let id = t.id();
    kernel.ready_to_run(t);
    kernel.timer_interrupt();
    assert_eq!(kernel.current_thread().id(), id);

    kernel.tick(1500);
    kernel.timer_interrupt();

    let contents = trace.contents();
    assert!(contents.contains("Tick 1700: Thread 0 changes its priority from 0 to 10"));
    // 仍在 L3 深处:不重新入队,只重开等待窗口
    assert_eq!(contents.matches("Thread 0 is inserted").count(), 1);
    assert_eq!(kernel.current_thread().id(), id);

    // 窗口刚重开,紧接着的中断不会再次提升
    kernel.timer_interrupt();
    assert!(!trace.contents().contains("from 10 to 20"));
}

#[test]
fn aging_clamps_at_priority_ceiling() {
    let (mut kernel, trace, _) = boot();

    let t = kernel.new_thread("t", 145);
    let id = t.id();
    kernel.ready_to_run(t);

    kernel.tick(1500);
    kernel.timer_interrupt();

    let contents = trace.contents();
    assert!(contents.contains(&format!(
        "Tick 1600: Thread {id} changes its priority from 145 to 149"
    )));
    assert_eq!(
        contents
            .matches(&format!("Thread {id} is inserted into queue L1"))
            .count(),
        2
    );
}

#[test]
fn demotion_drops_to_next_tier_top() {
    let (mut kernel, trace, _) = boot();

    let t = kernel.new_thread("t", 120);
    let id = t.id();
    kernel.ready_to_run(t);

    kernel.timer_interrupt();
    assert_eq!(kernel.current_thread().id(), id);

    kernel.tick(500);
    kernel.timer_interrupt();

    let contents = trace.contents();
    // 层级 2 的线程压到下一层级顶端:99 ∈ [50, 100)
    assert!(contents.contains(&format!(
        "Tick 700: Thread {id} changes its priority from 120 to 99"
    )));
    assert!(contents.contains(&format!("Thread {id} is inserted into queue L2")));
    assert_eq!(kernel.current_thread().id(), 0);
}

#[test]
fn dispatch_order_across_tiers() {
    let (mut kernel, _, _) = boot();

    let r1 = kernel.new_thread("r1", 10);
    let p1 = kernel.new_thread("p1", 60);
    let p2 = kernel.new_thread("p2", 90);
    let mut s1 = kernel.new_thread("s1", 110);
    s1.set_guess_cpu_burst(5.0);
    let order = [s1.id(), p2.id(), p1.id(), r1.id()];

    kernel.ready_to_run(r1);
    kernel.ready_to_run(p1);
    kernel.ready_to_run(p2);
    kernel.ready_to_run(s1);

    // 经由阻塞逐个放出队首:L1 → L2(优先级降序) → L3
    kernel.interrupt.set_level(IntLevel::Off);
    for expected in order {
        let parked = kernel.block_current().unwrap();
        assert_eq!(parked.status(), ThreadStatus::Blocked);
        assert_eq!(kernel.current_thread().id(), expected);
    }
    assert!(kernel.block_current().is_none());
    kernel.interrupt.set_level(IntLevel::On);
}

#[test]
fn sjf_order_breaks_ties_by_id() {
    let (mut kernel, _, _) = boot();

    let mut a = kernel.new_thread("a", 120);
    a.set_guess_cpu_burst(10.0);
    let mut b = kernel.new_thread("b", 120);
    b.set_guess_cpu_burst(10.0);
    let mut c = kernel.new_thread("c", 120);
    c.set_guess_cpu_burst(3.0);
    let order = [c.id(), a.id(), b.id()];

    // 乱序入队
    kernel.ready_to_run(b);
    kernel.ready_to_run(a);
    kernel.ready_to_run(c);

    kernel.interrupt.set_level(IntLevel::Off);
    for expected in order {
        kernel.block_current().unwrap();
        assert_eq!(kernel.current_thread().id(), expected);
    }
    kernel.interrupt.set_level(IntLevel::On);
}

#[test]
fn blocked_thread_can_be_woken() {
    let (mut kernel, _, _) = boot();

    let a = kernel.new_thread("a", 0);
    let ida = a.id();
    kernel.ready_to_run(a);

    kernel.interrupt.set_level(IntLevel::Off);
    let main = kernel.block_current().unwrap();
    kernel.interrupt.set_level(IntLevel::On);

    assert_eq!(kernel.current_thread().id(), ida);
    assert_eq!(main.status(), ThreadStatus::Blocked);

    // 唤醒即重新入队
    kernel.ready_to_run(main);
    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), 0);
}

#[test]
fn finish_reclaims_and_recycles_id() {
    let (mut kernel, _, _) = boot();

    let w = kernel.new_thread("w", 0);
    let idw = w.id();
    kernel.ready_to_run(w);
    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), idw);

    assert!(kernel.finish_current());
    assert_eq!(kernel.current_thread().id(), 0);

    // 尸体在后继线程的栈上回收,id 归还分配器
    let reborn = kernel.new_thread("reborn", 0);
    assert_eq!(reborn.id(), idw);
}

#[test]
fn finish_without_successor_is_refused() {
    let (mut kernel, _, _) = boot();
    assert!(!kernel.finish_current());
    assert_eq!(kernel.current_thread().id(), 0);
}

#[test]
fn burst_estimate_halves_toward_measurement() {
    let (mut kernel, trace, _) = boot();

    let t = kernel.new_thread("t", 0);
    let id = t.id();
    kernel.ready_to_run(t);
    kernel.yield_current();
    assert_eq!(kernel.current_thread().id(), id);

    // 占用 60 tick 后让出:est' = 0.5·60 + 0.5·0 = 30
    kernel.tick(60);
    kernel.yield_current();
    assert!(trace.contents().contains(&format!(
        "Thread {id} is inserted into queue L3 (EST: 30, PRI: 0)"
    )));
}

#[test]
fn trace_line_shapes() {
    let (mut kernel, trace, _) = boot();

    let mut t = kernel.new_thread("t", 120);
    t.set_guess_cpu_burst(10.0);
    let id = t.id();
    kernel.ready_to_run(t);
    kernel.yield_current();

    let contents = trace.contents();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(
        lines[0],
        format!("Tick 0: Thread {id} is inserted into queue L1 (EST: 10, PRI: 120)")
    );
    assert_eq!(
        lines[1],
        format!("Tick 0: Thread {id} is removed from queue L1 (EST: 10, PRI: 120)")
    );
    assert_eq!(
        lines[2],
        "Tick 0: Thread 0 is inserted into queue L3 (EST: 0, PRI: 0)"
    );
}

struct CountingSpace {
    saves: Arc<Mutex<u32>>,
    restores: Arc<Mutex<u32>>,
}

impl AddressSpace for CountingSpace {
    fn save_state(&mut self) {
        *self.saves.lock().unwrap() += 1;
    }

    fn restore_state(&mut self) {
        *self.restores.lock().unwrap() += 1;
    }
}

#[test]
fn address_space_hooks_fire_on_switch() {
    let (mut kernel, _, _) = boot();
    let saves = Arc::new(Mutex::new(0));
    let restores = Arc::new(Mutex::new(0));

    let mut user = kernel.new_thread("user", 0);
    user.attach_space(Box::new(CountingSpace {
        saves: saves.clone(),
        restores: restores.clone(),
    }));
    kernel.ready_to_run(user);

    // 切上 CPU:恢复用户态;主线程没有地址空间,无事发生
    kernel.yield_current();
    assert_eq!(*restores.lock().unwrap(), 1);
    assert_eq!(*saves.lock().unwrap(), 0);

    // 让出 CPU:保存用户态
    kernel.yield_current();
    assert_eq!(*saves.lock().unwrap(), 1);
    assert_eq!(*restores.lock().unwrap(), 1);
}

#[test]
#[should_panic]
fn scheduler_rejects_interrupts_on() {
    let (mut kernel, _, _) = boot();
    let t = kernel.new_thread("t", 0);
    let now = kernel.stats.total_ticks;
    // 开着中断闯入调度器
    kernel
        .scheduler
        .ready_to_run(t, None, &mut kernel.interrupt, now);
}
