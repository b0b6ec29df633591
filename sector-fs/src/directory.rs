//! # 目录层
//!
//! 目录就是一个文件，字节内容即定长表项表；
//! 路径解析叠加在字节接口之上，读写严格经过 [`OpenFile`]。
//! 表项用完即满，目录不可扩容。

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt::Write;
use core::mem;
use core::slice;

use crate::cache::Disk;
use crate::error::FsError;
use crate::layout::DirEntry;
use crate::open_file::OpenFile;
use crate::NUM_DIR_ENTRIES;

/// 内存中的目录表副本
pub struct Directory {
    table: [DirEntry; NUM_DIR_ENTRIES],
}

impl Directory {
    /// 目录文件的字节长度，恒等于整张表
    pub const BYTES: usize = NUM_DIR_ENTRIES * mem::size_of::<DirEntry>();

    /// 空目录
    pub fn new() -> Self {
        Self {
            table: [DirEntry::default(); NUM_DIR_ENTRIES],
        }
    }

    /// 从目录文件装入表项表
    pub fn fetch_from(file: &OpenFile) -> Self {
        let mut directory = Self::new();
        let read = file.read_at(directory.as_bytes_mut(), 0);
        debug_assert_eq!(read, Self::BYTES);
        directory
    }

    /// 把表项表写回目录文件
    pub fn write_back(&self, file: &OpenFile) {
        let written = file.write_at(self.as_bytes(), 0);
        debug_assert_eq!(written, Self::BYTES);
    }

    /// 本目录内查找名字，返回 `(文件头扇区, 是否目录)`
    pub fn find(&self, name: &str) -> Option<(u32, bool)> {
        self.index_of(name)
            .map(|i| (self.table[i].sector(), self.table[i].is_directory()))
    }

    /// 解析以`/`开头的绝对路径，返回终点的文件头扇区。
    ///
    /// 途中某一段不存在、或中间段不是目录时，解析落空；
    /// 终点本身的种类不作约束。
    pub fn find_recursive(&self, path: &str, disk: &Arc<Disk>, root_sector: u32) -> Option<u32> {
        debug_assert!(path.starts_with('/'));

        if path == "/" {
            return Some(root_sector);
        }
        self.find_relative(&path[1..], disk).map(|(sector, _)| sector)
    }

    /// 同 [`find_recursive`](Self::find_recursive)，但要求终点是目录。
    /// 文件系统层解析父目录都走这里。
    pub fn find_directory_recursive(
        &self,
        path: &str,
        disk: &Arc<Disk>,
        root_sector: u32,
    ) -> Option<u32> {
        debug_assert!(path.starts_with('/'));

        if path == "/" {
            return Some(root_sector);
        }
        let (sector, is_directory) = self.find_relative(&path[1..], disk)?;
        is_directory.then_some(sector)
    }

    fn find_relative(&self, path: &str, disk: &Arc<Disk>) -> Option<(u32, bool)> {
        let (segment, suffix) = match path.split_once('/') {
            Some((segment, suffix)) => (segment, Some(suffix)),
            None => (path, None),
        };

        let (sector, is_directory) = self.find(segment)?;

        match suffix {
            None => Some((sector, is_directory)),
            Some(suffix) => {
                if !is_directory {
                    return None;
                }
                let child_file = OpenFile::open(disk, sector);
                let child = Directory::fetch_from(&child_file);
                child.find_relative(suffix, disk)
            }
        }
    }

    /// 登记一个新表项。
    /// 同名表项已存在或表已满时不作任何修改。
    pub fn add(&mut self, name: &str, sector: u32, is_directory: bool) -> Result<(), FsError> {
        if self.index_of(name).is_some() {
            return Err(FsError::Duplicate);
        }

        let slot = self
            .table
            .iter_mut()
            .find(|entry| !entry.is_in_use())
            .ok_or(FsError::DirectoryFull)?;
        slot.occupy(name, sector, is_directory);
        log::debug!("directory: add {name}");

        Ok(())
    }

    /// 注销一个表项。只清表位，不释放扇区——那是文件系统层的职责。
    pub fn remove(&mut self, name: &str) -> Result<(), FsError> {
        let index = self.index_of(name).ok_or(FsError::PathNotFound)?;
        self.table[index].vacate();
        Ok(())
    }

    /// 在用表项
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.table.iter().filter(|entry| entry.is_in_use())
    }

    /// 逐行列出本目录内的名字
    pub fn list(&self) -> String {
        let mut out = String::new();
        for entry in self.entries() {
            let _ = writeln!(out, "{}", entry.name());
        }
        out
    }

    /// 递归列出，每层缩进两格
    pub fn list_recursive(&self, disk: &Arc<Disk>, depth: usize) -> String {
        let mut out = String::new();
        for entry in self.entries() {
            let _ = writeln!(out, "{:indent$}{}", "", entry.name(), indent = depth * 2);
            if entry.is_directory() {
                let child_file = OpenFile::open(disk, entry.sector());
                let child = Directory::fetch_from(&child_file);
                out.push_str(&child.list_recursive(disk, depth + 1));
            }
        }
        out
    }
}

impl Directory {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.table
            .iter()
            .position(|entry| entry.is_in_use() && entry.name_matches(name))
    }

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.table.as_ptr().cast(), Self::BYTES) }
    }

    #[inline]
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.table.as_mut_ptr().cast(), Self::BYTES) }
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}
