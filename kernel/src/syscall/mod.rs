//! 系统调用入口
//!
//! `sys_*` 是面向内核的实现层：用户内存的搬运(缓冲区、路径串)
//! 由外部的 CPU 模拟器出入口完成，进到这里的已经是内核数据。
//! 不携带指针参数的调用另有编号分发器。

mod fs;

pub use self::fs::*;

use core::fmt::Write;

use crate::kernel::Kernel;

pub const HALT: usize = 0;
pub const CREATE: usize = 4;
pub const OPEN: usize = 6;
pub const READ: usize = 7;
pub const WRITE: usize = 8;
pub const CLOSE: usize = 10;
pub const PRINT_INT: usize = 11;
pub const YIELD: usize = 12;

/// 无指针参数系统调用的编号分发
pub fn syscall(kernel: &mut Kernel, id: usize, args: [usize; 3]) -> isize {
    match id {
        HALT => {
            sys_halt(kernel);
            0
        }
        CLOSE => sys_close(kernel, args[0]),
        PRINT_INT => {
            sys_print_int(kernel, args[0] as i32);
            0
        }
        YIELD => {
            sys_yield(kernel);
            0
        }
        _ => panic!("unsupported syscall id: {id}"),
    }
}

pub fn sys_halt(kernel: &mut Kernel) {
    kernel.halt();
}

pub fn sys_print_int(kernel: &mut Kernel, n: i32) {
    let _ = writeln!(kernel.console, "{n}");
}

pub fn sys_yield(kernel: &mut Kernel) {
    kernel.yield_current();
}
