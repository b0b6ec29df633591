use std::mem;

use sector_fs::{DirEntry, Directory, DiskHeader, NUM_DIR_ENTRIES, SECTOR_SIZE};

#[test]
fn layout() {
    assert_eq!(SECTOR_SIZE, mem::size_of::<DiskHeader>());
    assert_eq!(DirEntry::SIZE, mem::size_of::<DirEntry>());
    assert_eq!(NUM_DIR_ENTRIES * DirEntry::SIZE, Directory::BYTES)
}
