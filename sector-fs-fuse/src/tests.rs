use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use sector_fs::{SectorFileSystem, NUM_SECTORS, SECTOR_SIZE};

use crate::BlockFile;

fn image(name: &str) -> (PathBuf, Arc<BlockFile>) {
    let path = std::env::temp_dir().join(format!("sector-fs-{name}-{}.img", std::process::id()));
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    fd.set_len((NUM_SECTORS * SECTOR_SIZE) as u64).unwrap();

    (path, Arc::new(BlockFile(Mutex::new(fd))))
}

#[test]
fn persists_across_mount() {
    let (path, device) = image("persist");

    {
        let mut fs = SectorFileSystem::format(device.clone());
        fs.create("/boot", 64, false).unwrap();
        let file = fs.open("/boot").unwrap();
        assert_eq!(file.write_at(b"kernel parameters", 0), 17);
        fs.sync();
    }

    {
        let fs = SectorFileSystem::mount(device);
        let file = fs.open("/boot").unwrap();
        assert_eq!(file.length(), 64);

        let mut buf = [0u8; 17];
        assert_eq!(file.read_at(&mut buf, 0), 17);
        assert_eq!(&buf, b"kernel parameters");
    }

    std::fs::remove_file(path).unwrap();
}

#[test]
fn directory_tree_survives_remount() {
    let (path, device) = image("tree");

    {
        let mut fs = SectorFileSystem::format(device.clone());
        fs.create("/etc", 0, true).unwrap();
        fs.create("/etc/rc", 32, false).unwrap();
        fs.sync();
    }

    let mut fs = SectorFileSystem::mount(device);
    assert!(fs.open("/etc/rc").is_some());
    assert_eq!(fs.list("/", true).unwrap(), "etc\n  rc\n");

    // 挂载后的实例同样可以继续改动
    fs.remove("/etc", true).unwrap();
    assert!(fs.open("/etc/rc").is_none());

    std::fs::remove_file(path).unwrap();
}
