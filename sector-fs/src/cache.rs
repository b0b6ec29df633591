//! # 扇区缓存层
//!
//! 磁盘读写速度慢于内存，因此把即将操作的扇区复制到内存缓冲区中，
//! 对扇区的所有操作都经过缓存，**操作时扇区一定在缓冲区当中**。
//! 部分覆盖一个扇区的写入因此天然是读-改-写。
//!
//! 缓存采取写回策略：脏扇区在被换出、同步或整台磁盘销毁时落盘。
//! 上层不持有缓存句柄，每次访问都以闭包映射一个类型化的扇区视图，
//! 视图的生命期不越出闭包——持久结构恰好各占一整个扇区，
//! 视图因此总是从扇区开头解读。

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::mem;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::{SectorData, SECTOR_SIZE};

/// 一台已挂载磁盘：块设备驱动加上它专属的扇区缓存。
///
/// 缓存随磁盘句柄走而不是全局共享，
/// 同一进程内可以同时挂载多台磁盘。
pub struct Disk {
    device: Arc<dyn BlockDevice>,
    cache: Mutex<SectorCache>,
}

/// 写回式扇区缓存，新近访问的扇区优先保留
struct SectorCache {
    slots: BTreeMap<usize, CacheSlot>,
    /// 访问计数，充当新近度时间戳
    clock: u64,
}

// 类型化视图要求扇区缓冲对齐
#[repr(C, align(8))]
struct CacheSlot {
    data: SectorData,
    dirty: bool,
    stamp: u64,
}

impl Disk {
    /// 同时驻留内存的扇区数上限
    const CACHED_SECTORS: usize = 16;

    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            cache: Mutex::new(SectorCache {
                slots: BTreeMap::new(),
                clock: 0,
            }),
        }
    }

    /// 以只读视角把扇区解读为`T`并交给闭包
    pub fn map_sector<T: Sized, V>(&self, sector: usize, f: impl FnOnce(&T) -> V) -> V {
        let mut cache = self.cache.lock();
        f(cache.slot(sector, &self.device).view())
    }

    /// 以读写视角把扇区解读为`T`并交给闭包，扇区随之转脏
    pub fn update_sector<T: Sized, V>(&self, sector: usize, f: impl FnOnce(&mut T) -> V) -> V {
        let mut cache = self.cache.lock();
        let slot = cache.slot(sector, &self.device);
        slot.dirty = true;
        f(slot.edit())
    }

    /// 把全部脏扇区落盘
    pub fn sync_all(&self) {
        let mut cache = self.cache.lock();
        for (&sector, slot) in cache.slots.iter_mut() {
            if slot.dirty {
                slot.dirty = false;
                self.device.write_sector(sector, &slot.data);
            }
        }
    }
}

impl Drop for Disk {
    fn drop(&mut self) {
        self.sync_all();
    }
}

impl SectorCache {
    /// 取得扇区的缓存槽位，不在内存时装入，必要时先腾位置
    fn slot(&mut self, sector: usize, device: &Arc<dyn BlockDevice>) -> &mut CacheSlot {
        self.clock += 1;

        if !self.slots.contains_key(&sector) {
            if self.slots.len() >= Disk::CACHED_SECTORS {
                self.evict_stalest(device);
            }

            let mut data = [0; SECTOR_SIZE];
            device.read_sector(sector, &mut data);
            self.slots.insert(
                sector,
                CacheSlot {
                    data,
                    dirty: false,
                    stamp: 0,
                },
            );
        }

        let slot = self.slots.get_mut(&sector).unwrap();
        slot.stamp = self.clock;
        slot
    }

    /// 换出最久未访问的扇区，脏的顺手写回
    fn evict_stalest(&mut self, device: &Arc<dyn BlockDevice>) {
        let stalest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.stamp)
            .map(|(&sector, _)| sector)
            .expect("evicting from an empty sector cache");

        let slot = self.slots.remove(&stalest).unwrap();
        if slot.dirty {
            device.write_sector(stalest, &slot.data);
        }
    }
}

impl CacheSlot {
    fn view<T: Sized>(&self) -> &T {
        Self::fit_check::<T>();
        unsafe { &*self.data.as_ptr().cast() }
    }

    fn edit<T: Sized>(&mut self) -> &mut T {
        Self::fit_check::<T>();
        unsafe { &mut *self.data.as_mut_ptr().cast() }
    }

    fn fit_check<T>() {
        assert!(mem::size_of::<T>() <= SECTOR_SIZE);
        assert!(mem::align_of::<T>() <= mem::align_of::<Self>());
    }
}
