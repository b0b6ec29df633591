//! # 空闲扇区位图
//!
//! 每个扇区对应一位，位为 1 表示该扇区已被占用。
//! 位图作为一个普通文件常驻磁盘，文件头位于公认扇区
//! [`FREEMAP_SECTOR`](crate::FREEMAP_SECTOR)。
//!
//! 每次修改性的文件系统操作都从磁盘装入一份位图副本，
//! 成功后写回，失败则原样丢弃——磁盘上因此不会出现半成品状态。

use alloc::vec;
use alloc::vec::Vec;

use crate::open_file::OpenFile;
use crate::NUM_SECTORS;

/// 位图内的 bit 组
type BitGroup = u64;

const GROUP_BITS: usize = BitGroup::BITS as usize;
/// 位图文件的字节长度
pub(crate) const FREEMAP_FILE_SIZE: usize = NUM_SECTORS / 8;

/// 内存中的空闲扇区位图副本
pub struct FreeMap {
    groups: Vec<BitGroup>,
}

impl FreeMap {
    /// 全空的位图，只在格式化磁盘时使用
    pub fn new() -> Self {
        Self {
            groups: vec![0; NUM_SECTORS / GROUP_BITS],
        }
    }

    /// 从位图文件装入一份副本
    pub fn load(file: &OpenFile) -> Self {
        let mut bytes = [0u8; FREEMAP_FILE_SIZE];
        let read = file.read_at(&mut bytes, 0);
        debug_assert_eq!(read, FREEMAP_FILE_SIZE);

        let groups = bytes
            .chunks_exact(GROUP_BITS / 8)
            .map(|chunk| BitGroup::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        Self { groups }
    }

    /// 把副本写回位图文件
    pub fn store(&self, file: &OpenFile) {
        let mut bytes = [0u8; FREEMAP_FILE_SIZE];
        for (chunk, group) in bytes.chunks_exact_mut(GROUP_BITS / 8).zip(&self.groups) {
            chunk.copy_from_slice(&group.to_le_bytes());
        }
        let written = file.write_at(&bytes, 0);
        debug_assert_eq!(written, FREEMAP_FILE_SIZE);
    }

    pub fn mark(&mut self, sector: u32) {
        let (group, ingroup) = Self::locate(sector);
        self.groups[group] |= 1 << ingroup;
    }

    pub fn clear(&mut self, sector: u32) {
        let (group, ingroup) = Self::locate(sector);

        // 只有已分配的扇区才能释放
        assert_ne!(self.groups[group] & (1 << ingroup), 0);

        self.groups[group] -= 1 << ingroup;
    }

    #[inline]
    pub fn test(&self, sector: u32) -> bool {
        let (group, ingroup) = Self::locate(sector);
        self.groups[group] & (1 << ingroup) != 0
    }

    /// 分配编号最小的空闲扇区并置位；位图饱和时返回空。
    /// 扇区耗尽是正常返回值，不是故障。
    pub fn find_and_set(&mut self) -> Option<u32> {
        let (group, ingroup) = self
            .groups
            .iter()
            .enumerate()
            .find_map(|(group, &bits)| {
                (bits != BitGroup::MAX).then_some((group, bits.trailing_ones() as usize))
            })?;

        self.groups[group] |= 1 << ingroup;
        Some((group * GROUP_BITS + ingroup) as u32)
    }

    /// 已置位的扇区个数
    pub fn count(&self) -> usize {
        self.groups
            .iter()
            .map(|group| group.count_ones() as usize)
            .sum()
    }

    pub fn print(&self) {
        let occupied: Vec<u32> = (0..NUM_SECTORS as u32).filter(|&s| self.test(s)).collect();
        log::debug!("free map: {} sectors in use: {occupied:?}", occupied.len());
    }
}

impl FreeMap {
    #[inline]
    fn locate(sector: u32) -> (usize, usize) {
        let sector = sector as usize;
        assert!(sector < NUM_SECTORS);
        (sector / GROUP_BITS, sector % GROUP_BITS)
    }
}

impl Default for FreeMap {
    fn default() -> Self {
        Self::new()
    }
}
