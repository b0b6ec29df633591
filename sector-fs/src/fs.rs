//! # 文件系统层
//!
//! 顶层编排：格式化/挂载、创建、打开、删除(可递归)、列目录，
//! 并持有描述符表。空闲位图与根目录作为两个常驻打开文件被一直持有，
//! 它们的文件头位于公认扇区 0 与 1，启动时凭此定位。
//!
//! 修改性操作在磁盘层面全有或全无：装入位图/目录的内存副本，
//! 全部成功后才依次写回；任何一步失败都在写回之前返回，
//! 副本随之丢弃，磁盘保持原状。

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::cache::Disk;
use crate::directory::Directory;
use crate::error::FsError;
use crate::freemap::{FreeMap, FREEMAP_FILE_SIZE};
use crate::layout::{FileHeader, FILE_NAME_MAX_LEN};
use crate::open_file::OpenFile;
use crate::path::Path;
use crate::{FREEMAP_SECTOR, MAX_OPEN_FILES, NUM_SECTORS, ROOT_DIR_SECTOR};

pub struct SectorFileSystem {
    disk: Arc<Disk>,
    free_map_file: OpenFile,
    root_dir_file: OpenFile,
    /// 描述符表，0 号槽位保留为非法描述符
    descriptors: Vec<Option<OpenFile>>,
    descriptor_cursor: usize,
}

impl SectorFileSystem {
    /// 在空白磁盘上建立文件系统。
    ///
    /// 先占住两个公认扇区，再为位图文件与根目录文件分配数据扇区、
    /// 写回两个文件头，最后经由文件层写入位图内容与空目录表。
    pub fn format(device: Arc<dyn BlockDevice>) -> Self {
        log::debug!("formatting the file system, {NUM_SECTORS} sectors");

        let disk = Arc::new(Disk::new(device));
        let mut free_map = FreeMap::new();
        let mut map_header = FileHeader::new();
        let mut dir_header = FileHeader::new();

        // 先把两个文件头扇区占住，不许别人染指
        free_map.mark(FREEMAP_SECTOR);
        free_map.mark(ROOT_DIR_SECTOR);

        map_header
            .allocate(&mut free_map, FREEMAP_FILE_SIZE)
            .expect("fresh disk cannot hold the free map");
        dir_header
            .allocate(&mut free_map, Directory::BYTES)
            .expect("fresh disk cannot hold the root directory");

        // 文件头先落盘，之后才能按扇区号打开这两个文件
        map_header.write_back(&disk, FREEMAP_SECTOR);
        dir_header.write_back(&disk, ROOT_DIR_SECTOR);

        let free_map_file = OpenFile::open(&disk, FREEMAP_SECTOR);
        let root_dir_file = OpenFile::open(&disk, ROOT_DIR_SECTOR);

        free_map.store(&free_map_file);
        Directory::new().write_back(&root_dir_file);

        Self {
            disk,
            free_map_file,
            root_dir_file,
            descriptors: (0..=MAX_OPEN_FILES).map(|_| None).collect(),
            descriptor_cursor: 0,
        }
    }

    /// 挂载一块已格式化的磁盘：按公认扇区打开两个常驻文件即可
    pub fn mount(device: Arc<dyn BlockDevice>) -> Self {
        let disk = Arc::new(Disk::new(device));
        let free_map_file = OpenFile::open(&disk, FREEMAP_SECTOR);
        let root_dir_file = OpenFile::open(&disk, ROOT_DIR_SECTOR);

        Self {
            disk,
            free_map_file,
            root_dir_file,
            descriptors: (0..=MAX_OPEN_FILES).map(|_| None).collect(),
            descriptor_cursor: 0,
        }
    }

    /// 创建文件或目录。目录的初始大小恒为整张表项表。
    pub fn create(
        &mut self,
        path: &str,
        initial_size: usize,
        is_directory: bool,
    ) -> Result<(), FsError> {
        let size = if is_directory {
            Directory::BYTES
        } else {
            initial_size
        };
        log::debug!("creating {path} (directory: {is_directory}, size {size})");

        let (parent_path, leaf) = path.parent_file().ok_or(FsError::InvalidPath)?;
        if leaf.is_empty() || leaf.len() > FILE_NAME_MAX_LEN {
            return Err(FsError::InvalidPath);
        }

        let root = Directory::fetch_from(&self.root_dir_file);
        let parent_sector = root
            .find_directory_recursive(parent_path, &self.disk, ROOT_DIR_SECTOR)
            .ok_or(FsError::PathNotFound)?;

        let parent_file = OpenFile::open(&self.disk, parent_sector);
        let mut parent = Directory::fetch_from(&parent_file);
        if parent.find(leaf).is_some() {
            return Err(FsError::Duplicate);
        }

        let mut free_map = FreeMap::load(&self.free_map_file);
        let header_sector = free_map.find_and_set().ok_or(FsError::NoFreeSector)?;
        parent.add(leaf, header_sector, is_directory)?;

        let mut header = FileHeader::new();
        header.allocate(&mut free_map, size)?;

        // 至此全部成功，统一写回
        header.write_back(&self.disk, header_sector);
        parent.write_back(&parent_file);
        free_map.store(&self.free_map_file);

        if is_directory {
            let dir_file = OpenFile::open(&self.disk, header_sector);
            Directory::new().write_back(&dir_file);
        }

        Ok(())
    }

    /// 打开文件，找不到时返回空
    pub fn open(&self, path: &str) -> Option<OpenFile> {
        log::debug!("opening {path}");

        let (parent_path, leaf) = path.parent_file()?;
        let root = Directory::fetch_from(&self.root_dir_file);
        let parent_sector = root.find_directory_recursive(parent_path, &self.disk, ROOT_DIR_SECTOR)?;

        let parent_file = OpenFile::open(&self.disk, parent_sector);
        let parent = Directory::fetch_from(&parent_file);
        let (sector, _) = parent.find(leaf)?;

        Some(OpenFile::open(&self.disk, sector))
    }

    /// 删除文件；目录只在 `recursive` 时可删，且连同整棵子树。
    pub fn remove(&mut self, path: &str, recursive: bool) -> Result<(), FsError> {
        log::debug!("removing {path} (recursive: {recursive})");

        let (parent_path, leaf) = path.parent_file().ok_or(FsError::InvalidPath)?;
        let root = Directory::fetch_from(&self.root_dir_file);
        let parent_sector = root
            .find_directory_recursive(parent_path, &self.disk, ROOT_DIR_SECTOR)
            .ok_or(FsError::PathNotFound)?;

        let parent_file = OpenFile::open(&self.disk, parent_sector);
        let mut parent = Directory::fetch_from(&parent_file);
        let (sector, is_directory) = parent.find(leaf).ok_or(FsError::PathNotFound)?;

        if is_directory && !recursive {
            return Err(FsError::IsADirectory);
        }

        if is_directory {
            let dir_file = OpenFile::open(&self.disk, sector);
            let directory = Directory::fetch_from(&dir_file);
            for entry in directory.entries() {
                // 子路径始终以显式的`/`拼接
                let child = format!("{}/{}", path.trim_end_matches('/'), entry.name());
                self.remove(&child, true)?;
            }
        }

        let header = FileHeader::fetch_from(&self.disk, sector);
        let mut free_map = FreeMap::load(&self.free_map_file);

        header.deallocate(&mut free_map);

        // 头部链自身占用的扇区逐个回收
        let mut header_sector = sector;
        let mut current = Some(&header);
        while let Some(h) = current {
            free_map.clear(header_sector);
            match h.next_header_sector() {
                Some(next_sector) => {
                    header_sector = next_sector;
                    current = h.next_header();
                }
                None => current = None,
            }
        }

        parent
            .remove(leaf)
            .expect("directory entry vanished while removing");

        free_map.store(&self.free_map_file);
        parent.write_back(&parent_file);

        Ok(())
    }

    /// 渲染目录列表
    pub fn list(&self, path: &str, recursive: bool) -> Result<String, FsError> {
        let root = Directory::fetch_from(&self.root_dir_file);

        let directory = if path == "/" {
            root
        } else {
            let (parent_path, leaf) = path.parent_file().ok_or(FsError::InvalidPath)?;
            let parent_sector = root
                .find_directory_recursive(parent_path, &self.disk, ROOT_DIR_SECTOR)
                .ok_or(FsError::PathNotFound)?;

            let parent_file = OpenFile::open(&self.disk, parent_sector);
            let parent = Directory::fetch_from(&parent_file);
            let (sector, is_directory) = parent.find(leaf).ok_or(FsError::PathNotFound)?;
            if !is_directory {
                return Err(FsError::NotADirectory);
            }

            Directory::fetch_from(&OpenFile::open(&self.disk, sector))
        };

        Ok(if recursive {
            directory.list_recursive(&self.disk, 0)
        } else {
            directory.list()
        })
    }

    /// 把打开文件装入描述符表，返回描述符。
    ///
    /// 游标在 `1..=MAX_OPEN_FILES` 上轮转，0 号永不发出；
    /// 扫完一整圈仍无空槽时返回 0。
    pub fn put_descriptor(&mut self, file: OpenFile) -> usize {
        let mut attempts = 0;
        loop {
            self.descriptor_cursor = self.descriptor_cursor % MAX_OPEN_FILES + 1;
            if self.descriptors[self.descriptor_cursor].is_none() {
                break;
            }
            attempts += 1;
            if attempts >= MAX_OPEN_FILES {
                return 0;
            }
        }

        let id = self.descriptor_cursor;
        self.descriptors[id] = Some(file);
        id
    }

    /// 经描述符读取，推进游标；描述符非法时返回 -1
    pub fn read_descriptor(&mut self, buf: &mut [u8], id: usize) -> isize {
        match self.descriptor_slot(id) {
            Ok(file) => file.read(buf) as isize,
            Err(_) => -1,
        }
    }

    /// 经描述符写入，推进游标；描述符非法时返回 -1
    pub fn write_descriptor(&mut self, buf: &[u8], id: usize) -> isize {
        match self.descriptor_slot(id) {
            Ok(file) => file.write(buf) as isize,
            Err(_) => -1,
        }
    }

    /// 关闭描述符并释放句柄；成功返回 1，描述符非法时返回 -1
    pub fn close_descriptor(&mut self, id: usize) -> isize {
        if self.descriptor_slot(id).is_err() {
            return -1;
        }
        self.descriptors[id] = None;
        1
    }

    /// 把扇区缓存全部落盘
    pub fn sync(&self) {
        self.disk.sync_all();
    }

    /// 位图中已置位的扇区总数，体检用
    pub fn allocated_sectors(&self) -> usize {
        FreeMap::load(&self.free_map_file).count()
    }

    /// 查询某扇区在位图中是否已被占用，体检用
    pub fn sector_in_use(&self, sector: u32) -> bool {
        FreeMap::load(&self.free_map_file).test(sector)
    }

    fn descriptor_slot(&mut self, id: usize) -> Result<&mut OpenFile, FsError> {
        if id == 0 || id > MAX_OPEN_FILES {
            return Err(FsError::BadDescriptor);
        }
        self.descriptors[id].as_mut().ok_or(FsError::BadDescriptor)
    }

    /// 倾印两个常驻文件头与位图，调试用
    pub fn print(&self) {
        let map_header = FileHeader::fetch_from(&self.disk, FREEMAP_SECTOR);
        let dir_header = FileHeader::fetch_from(&self.disk, ROOT_DIR_SECTOR);
        log::debug!(
            "free map file header: {} bytes over {} sectors",
            map_header.length(),
            map_header.num_sectors()
        );
        log::debug!(
            "root directory file header: {} bytes over {} sectors",
            dir_header.length(),
            dir_header.num_sectors()
        );
        FreeMap::load(&self.free_map_file).print();
    }
}
