//! 文件头(索引节点)
//!
//! 每个文件头恰好占据一个扇区，记录文件长度与数据扇区号表；
//! 容量超出一个头部所能索引的范围时，用 `next_header_sector`
//! 链出下一个头部。链按扇区顺序持久化，重建就是一次顺序遍历。
//!
//! 约定：链上每个头部的 `length` 统计**从该头部起**覆盖的字节数，
//! 链头的 `length` 即文件长度。

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::mem;

use crate::cache::Disk;
use crate::error::FsError;
use crate::freemap::FreeMap;
use crate::SECTOR_SIZE;

/// 单个头部可索引的数据扇区数
pub const HEADER_TABLE_LEN: usize = (SECTOR_SIZE - 3 * mem::size_of::<i32>()) / mem::size_of::<i32>();

/// 磁盘上的"不存在"扇区标记，也用作链尾
const NONE_SECTOR: i32 = -1;

/// 文件头的磁盘布局，恰好一个扇区
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DiskHeader {
    /// 从本头部起覆盖的字节数
    length: i32,
    /// 本头部表内有效的数据扇区数
    num_sectors: i32,
    /// 下一个头部所在扇区，链尾为 [`NONE_SECTOR`]
    next_header_sector: i32,
    data_sectors: [i32; HEADER_TABLE_LEN],
}

/// 内存中的文件头链
pub struct FileHeader {
    raw: DiskHeader,
    next: Option<Box<FileHeader>>,
}

impl DiskHeader {
    const fn empty() -> Self {
        Self {
            length: 0,
            num_sectors: 0,
            next_header_sector: NONE_SECTOR,
            data_sectors: [NONE_SECTOR; HEADER_TABLE_LEN],
        }
    }
}

impl FileHeader {
    pub fn new() -> Self {
        Self {
            raw: DiskHeader::empty(),
            next: None,
        }
    }

    /// 为 `size` 字节的文件预定数据扇区，必要时链出新头部
    /// (链出的头部本身也额外占一个扇区)。
    ///
    /// 空间不足时释放本次已预定的全部扇区并报告失败，
    /// 位图副本回到调用前的状态。
    pub fn allocate(&mut self, free_map: &mut FreeMap, size: usize) -> Result<(), FsError> {
        let total = size.div_ceil(SECTOR_SIZE);
        let own = total.min(HEADER_TABLE_LEN);

        let mut reserved: Vec<u32> = Vec::with_capacity(own);
        for _ in 0..own {
            match free_map.find_and_set() {
                Some(sector) => reserved.push(sector),
                None => {
                    Self::release(free_map, &reserved);
                    return Err(FsError::NoFreeSector);
                }
            }
        }

        let mut next = None;
        let mut next_sector = NONE_SECTOR;
        if total > own {
            let Some(header_sector) = free_map.find_and_set() else {
                Self::release(free_map, &reserved);
                return Err(FsError::NoFreeSector);
            };

            let mut tail = FileHeader::new();
            if let Err(e) = tail.allocate(free_map, size - own * SECTOR_SIZE) {
                free_map.clear(header_sector);
                Self::release(free_map, &reserved);
                return Err(e);
            }

            next_sector = header_sector as i32;
            next = Some(Box::new(tail));
        }

        self.raw.length = size as i32;
        self.raw.num_sectors = own as i32;
        self.raw.next_header_sector = next_sector;
        for (slot, sector) in self.raw.data_sectors.iter_mut().zip(&reserved) {
            *slot = *sector as i32;
        }
        self.next = next;

        Ok(())
    }

    /// 释放整条链的**数据**扇区。
    /// 头部链自身占用的扇区由调用方沿
    /// [`next_header_sector`](Self::next_header_sector) 逐个回收。
    pub fn deallocate(&self, free_map: &mut FreeMap) {
        for &sector in &self.raw.data_sectors[..self.raw.num_sectors as usize] {
            free_map.clear(sector as u32);
        }
        if let Some(next) = self.next.as_deref() {
            next.deallocate(free_map);
        }
    }

    /// 把文件内字节偏移解析为数据扇区号
    pub fn byte_to_sector(&self, offset: usize) -> u32 {
        let span = self.raw.num_sectors as usize * SECTOR_SIZE;
        if offset < span {
            self.raw.data_sectors[offset / SECTOR_SIZE] as u32
        } else {
            self.next
                .as_deref()
                .expect("byte offset beyond the header chain")
                .byte_to_sector(offset - span)
        }
    }

    /// 从磁盘读出头部并跟随链装入整条
    pub fn fetch_from(disk: &Disk, sector: u32) -> Self {
        let raw = disk.map_sector(sector as usize, |header: &DiskHeader| *header);

        let next = (raw.next_header_sector != NONE_SECTOR)
            .then(|| Box::new(Self::fetch_from(disk, raw.next_header_sector as u32)));

        Self { raw, next }
    }

    /// 按链序把整条头部链写回磁盘
    pub fn write_back(&self, disk: &Disk, sector: u32) {
        disk.update_sector(sector as usize, |header: &mut DiskHeader| *header = self.raw);

        if let Some(next) = self.next.as_deref() {
            next.write_back(disk, self.raw.next_header_sector as u32);
        }
    }

    /// 文件长度(字节)
    #[inline]
    pub fn length(&self) -> usize {
        self.raw.length as usize
    }

    /// 本头部表内有效的数据扇区数
    #[inline]
    pub fn num_sectors(&self) -> usize {
        self.raw.num_sectors as usize
    }

    /// 本头部表内的数据扇区号，不含链上的后继
    pub fn data_sectors(&self) -> impl Iterator<Item = u32> + '_ {
        self.raw.data_sectors[..self.raw.num_sectors as usize]
            .iter()
            .map(|&sector| sector as u32)
    }

    #[inline]
    pub fn next_header_sector(&self) -> Option<u32> {
        (self.raw.next_header_sector != NONE_SECTOR).then_some(self.raw.next_header_sector as u32)
    }

    #[inline]
    pub fn next_header(&self) -> Option<&FileHeader> {
        self.next.as_deref()
    }
}

impl FileHeader {
    fn release(free_map: &mut FreeMap, reserved: &[u32]) {
        for &sector in reserved {
            free_map.clear(sector);
        }
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
