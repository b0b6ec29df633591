//! 文件类系统调用
//!
//! 每个修改性的文件系统操作都包在关中断区间里，
//! 这与调度器共用同一套互斥纪律。

use crate::interrupt::IntLevel;
use crate::kernel::Kernel;

/// 成功返回 1，失败返回 0
pub fn sys_create(kernel: &mut Kernel, path: &str, size: usize) -> isize {
    let old_level = kernel.interrupt.set_level(IntLevel::Off);
    let created = kernel.file_system.create(path, size, false);
    kernel.interrupt.set_level(old_level);

    match created {
        Ok(()) => 1,
        Err(e) => {
            log::debug!("create {path} failed: {e:?}");
            0
        }
    }
}

/// 返回描述符；0 表示描述符表已满，-1 表示路径不存在
pub fn sys_open(kernel: &mut Kernel, path: &str) -> isize {
    let old_level = kernel.interrupt.set_level(IntLevel::Off);
    let fd = match kernel.file_system.open(path) {
        Some(file) => kernel.file_system.put_descriptor(file) as isize,
        None => -1,
    };
    kernel.interrupt.set_level(old_level);

    fd
}

/// 返回读到的字节数，描述符非法时 -1
pub fn sys_read(kernel: &mut Kernel, buf: &mut [u8], fd: usize) -> isize {
    let old_level = kernel.interrupt.set_level(IntLevel::Off);
    let read = kernel.file_system.read_descriptor(buf, fd);
    kernel.interrupt.set_level(old_level);

    read
}

/// 返回写入的字节数，描述符非法时 -1
pub fn sys_write(kernel: &mut Kernel, buf: &[u8], fd: usize) -> isize {
    let old_level = kernel.interrupt.set_level(IntLevel::Off);
    let written = kernel.file_system.write_descriptor(buf, fd);
    kernel.interrupt.set_level(old_level);

    written
}

/// 成功恒返回 1，描述符非法时 -1
pub fn sys_close(kernel: &mut Kernel, fd: usize) -> isize {
    let old_level = kernel.interrupt.set_level(IntLevel::Off);
    let closed = kernel.file_system.close_descriptor(fd);
    kernel.interrupt.set_level(old_level);

    closed
}
