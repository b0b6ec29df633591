#![no_std]

extern crate alloc;

/* 文件系统的整体架构，自上而下 */

// 文件系统层：格式化、创建、打开、删除、列目录，并持有描述符表
mod fs;

// 目录层：定长表项 + 递归路径解析
mod directory;

// 文件层：基于文件头的字节级读写游标
mod open_file;

// 磁盘数据结构层：文件头(链)与目录项的持久布局
mod layout;

// 空闲扇区位图：以普通文件的形式常驻磁盘
mod freemap;

// 扇区缓存层：内存上的磁盘扇区数据缓存
mod cache;

mod error;
mod path;

pub use self::{
    cache::Disk,
    directory::Directory,
    error::FsError,
    freemap::FreeMap,
    fs::SectorFileSystem,
    layout::{DirEntry, DiskHeader, FileHeader, FILE_NAME_MAX_LEN, HEADER_TABLE_LEN},
    open_file::OpenFile,
    path::Path,
};
pub use block_dev::BlockDevice;

/// 扇区大小(字节)，所有持久结构都对齐到它
pub const SECTOR_SIZE: usize = 128;
/// 磁盘总扇区数；空闲位图恰好占据一个扇区
pub const NUM_SECTORS: usize = 1024;

/// 空闲位图文件的文件头所在的公认扇区
pub const FREEMAP_SECTOR: u32 = 0;
/// 根目录文件的文件头所在的公认扇区
pub const ROOT_DIR_SECTOR: u32 = 1;

/// 每个目录的表项数上限，目录不可扩容
pub const NUM_DIR_ENTRIES: usize = 64;
/// 描述符表容量；0 号描述符保留为非法值
pub const MAX_OPEN_FILES: usize = 16;

type SectorData = [u8; SECTOR_SIZE];
