//! # 文件层
//!
//! [`OpenFile`] 在文件头之上确立字节视角：
//! `read_at`/`write_at` 按扇区逐段搬运，游标式 `read`/`write`
//! 供描述符表使用。文件在本层不可扩展，越界写入被截断。

use alloc::sync::Arc;

use crate::cache::Disk;
use crate::layout::FileHeader;
use crate::{SectorData, SECTOR_SIZE};

/// 带游标的打开文件句柄，持有文件头的内存快照。
/// 只属于它的创建者，不跨线程共享。
pub struct OpenFile {
    disk: Arc<Disk>,
    header: FileHeader,
    header_sector: u32,
    cursor: usize,
}

impl OpenFile {
    /// 打开文件头位于 `header_sector` 的文件
    pub fn open(disk: &Arc<Disk>, header_sector: u32) -> Self {
        Self {
            header: FileHeader::fetch_from(disk, header_sector),
            disk: disk.clone(),
            header_sector,
            cursor: 0,
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.header.length()
    }

    #[inline]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    #[inline]
    pub fn header_sector(&self) -> u32 {
        self.header_sector
    }

    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.cursor = position.min(self.length());
    }

    /// 从指定字节偏移读出数据填充`buf`，返回实际读取的字节数。
    /// 读取范围被收缩到 `[0, length)` 之内。
    pub fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        let mut start = offset;
        let end = (start + buf.len()).min(self.length());

        if start >= end {
            return 0;
        }

        // 已读取多少字节
        let mut read_size = 0;
        loop {
            // 当前扇区的末地址(字节)
            let sector_index = start / SECTOR_SIZE;
            let current_sector_end = ((sector_index + 1) * SECTOR_SIZE).min(end);
            let sector_read_size = current_sector_end - start;
            let dest = &mut buf[read_size..read_size + sector_read_size];

            let sector = self.header.byte_to_sector(start);
            self.disk
                .map_sector(sector as usize, |data: &SectorData| {
                    // 绝对地址 % 扇区大小 = 扇区内偏移
                    let src = &data[start % SECTOR_SIZE..start % SECTOR_SIZE + sector_read_size];
                    dest.copy_from_slice(src);
                });

            read_size += sector_read_size;

            if current_sector_end == end {
                break;
            }

            start = current_sector_end;
        }

        read_size
    }

    /// 向指定字节偏移写入`buf`，返回实际写入的字节数。
    /// 越过文件末尾的部分被截断；
    /// 只触及半个扇区的边界经由缓存天然读-改-写。
    pub fn write_at(&self, buf: &[u8], offset: usize) -> usize {
        let mut start = offset;
        let end = (start + buf.len()).min(self.length());

        if start >= end {
            return 0;
        }

        let mut written_size = 0;
        loop {
            let sector_index = start / SECTOR_SIZE;
            let current_sector_end = ((sector_index + 1) * SECTOR_SIZE).min(end);
            let sector_write_size = current_sector_end - start;
            let src = &buf[written_size..written_size + sector_write_size];

            let sector = self.header.byte_to_sector(start);
            self.disk
                .update_sector(sector as usize, |data: &mut SectorData| {
                    let dest =
                        &mut data[start % SECTOR_SIZE..start % SECTOR_SIZE + sector_write_size];
                    dest.copy_from_slice(src);
                });

            written_size += sector_write_size;

            if current_sector_end == end {
                break;
            }

            start = current_sector_end;
        }

        written_size
    }

    /// 从游标处读取并推进游标
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let read_size = self.read_at(buf, self.cursor);
        self.cursor += read_size;
        read_size
    }

    /// 向游标处写入并推进游标
    pub fn write(&mut self, buf: &[u8]) -> usize {
        let written_size = self.write_at(buf, self.cursor);
        self.cursor += written_size;
        written_size
    }
}
