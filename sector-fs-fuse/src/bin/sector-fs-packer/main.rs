mod cli;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;

use clap::Parser;
use cli::Cli;
use sector_fs::{SectorFileSystem, NUM_SECTORS, SECTOR_SIZE};
use sector_fs_fuse::BlockFile;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}", cli.source);

    let block_file = Arc::new(BlockFile(Mutex::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(cli.out_dir.join("fs.img"))?;
        fd.set_len((NUM_SECTORS * SECTOR_SIZE) as u64).unwrap();

        fd
    })));

    let mut fs = SectorFileSystem::format(block_file);

    for entry in fs::read_dir(&cli.source)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_str().expect("source file name is not UTF-8");

        let mut host_file = File::open(entry.path())?;
        let mut data: Vec<u8> = Vec::new();
        host_file.read_to_end(&mut data)?;

        let path = format!("/{name}");
        println!("packing: {path} ({} bytes)", data.len());

        if let Err(e) = fs.create(&path, data.len(), false) {
            log::warn!("skipping {path}: {e:?}");
            continue;
        }
        let file = fs.open(&path).unwrap();
        file.write_at(&data, 0);
    }

    fs.sync();
    print!("{}", fs.list("/", true).unwrap());

    Ok(())
}
