use std::fmt;
use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;
use kernel::Kernel;
use sector_fs::{NUM_SECTORS, SECTOR_SIZE};

/// 内存盘
pub struct MemDisk(Mutex<Vec<u8>>);

impl MemDisk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(vec![0; NUM_SECTORS * SECTOR_SIZE])))
    }
}

impl BlockDevice for MemDisk {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) {
        let data = self.0.lock().unwrap();
        buf.copy_from_slice(&data[sector * SECTOR_SIZE..(sector + 1) * SECTOR_SIZE]);
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) {
        let mut data = self.0.lock().unwrap();
        data[sector * SECTOR_SIZE..(sector + 1) * SECTOR_SIZE].copy_from_slice(buf);
    }
}

/// 可共享的日志汇，测试由此检视调度追踪与控制台输出
#[derive(Clone, Default)]
pub struct Sink(Arc<Mutex<String>>);

impl Sink {
    pub fn contents(&self) -> String {
        self.0.lock().unwrap().clone()
    }
}

impl fmt::Write for Sink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.lock().unwrap().push_str(s);
        Ok(())
    }
}

/// 开机:格式化内存盘，交出内核与两个日志汇
pub fn boot() -> (Kernel, Sink, Sink) {
    let trace = Sink::default();
    let console = Sink::default();
    let kernel = Kernel::new(
        MemDisk::new(),
        true,
        Box::new(trace.clone()),
        Box::new(console.clone()),
    );
    (kernel, trace, console)
}
