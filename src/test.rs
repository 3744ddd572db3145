//! End-to-end tests against a real image file under target/.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::device::BlockFile;
use crate::fs::{
    list_all, BlockDevice, FileHandle, FileInfo, FileSystem, FsError, ListAll,
    INODE_TABLE_START, MAX_BLOCKS_TRACKED, MAX_FILE_SECTORS, SECTOR_SIZE, TOTAL_INODE_SECTORS,
};

/// Fresh image file under target/, one per test so they can run in
/// parallel.
fn image_device(name: &str) -> Arc<dyn BlockDevice> {
    let path = format!("target/{name}.img");
    let _ = std::fs::remove_file(&path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)
        .unwrap();
    file.set_len((MAX_BLOCKS_TRACKED as usize * SECTOR_SIZE) as u64)
        .unwrap();
    Arc::new(BlockFile(Mutex::new(file)))
}

#[test]
fn format_then_mount_round_trips() {
    let device = image_device("format_then_mount");
    let (superblock, inode_words, data_words) = {
        let fs = FileSystem::format(device.clone()).unwrap();
        let guard = fs.lock();
        (
            *guard.superblock(),
            guard.inode_bitmap.words().to_vec(),
            guard.data_bitmap.words().to_vec(),
        )
    };
    let fs = FileSystem::mount(device).unwrap();
    let guard = fs.lock();
    assert_eq!(*guard.superblock(), superblock);
    assert_eq!(guard.inode_bitmap.words(), &inode_words[..]);
    assert_eq!(guard.data_bitmap.words(), &data_words[..]);
}

#[test]
fn create_write_read_back() {
    let fs = FileSystem::format(image_device("create_write_read")).unwrap();
    let mut handle = FileHandle::create(&fs, "log").unwrap();
    handle.write_at(0, b"hello").unwrap();
    handle.close().unwrap();

    let mut handle = FileHandle::open(&fs, "log").unwrap();
    assert_eq!(handle.size(), 5);
    assert_eq!(handle.name(), "log");
    let mut buf = [0u8; 5];
    handle.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello");
}

#[test]
fn write_spans_sector_boundary() {
    let fs = FileSystem::format(image_device("sector_boundary")).unwrap();
    let data: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();

    let mut handle = FileHandle::create(&fs, "span").unwrap();
    handle.append(&data).unwrap();
    assert_eq!(handle.size(), 600);
    assert_eq!(handle.sectors_allocated(), 2);
    handle.close().unwrap();

    let mut handle = FileHandle::open(&fs, "span").unwrap();
    let mut back = vec![0u8; 600];
    handle.read_at(0, &mut back).unwrap();
    assert_eq!(back, data);

    // Two bytes straddling the first sector edge.
    let mut pair = [0u8; 2];
    handle.read_at(511, &mut pair).unwrap();
    assert_eq!(pair, [data[511], data[512]]);
}

#[test]
fn append_resumes_after_each_write() {
    let fs = FileSystem::format(image_device("append_resumes")).unwrap();
    let mut rng = rand::thread_rng();
    let mut expected = Vec::new();

    let mut handle = FileHandle::create(&fs, "chunks").unwrap();
    for len in [1usize, 511, 512, 513, 1000, 37] {
        let chunk: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        handle.append(&chunk).unwrap();
        expected.extend_from_slice(&chunk);
        assert_eq!(handle.size(), expected.len() as u32);
    }
    handle.close().unwrap();

    let mut handle = FileHandle::open(&fs, "chunks").unwrap();
    let mut back = vec![0u8; expected.len()];
    handle.read_at(0, &mut back).unwrap();
    assert_eq!(back, expected);
}

#[test]
fn overwrite_keeps_size_at_high_water_mark() {
    let fs = FileSystem::format(image_device("overwrite")).unwrap();
    let mut handle = FileHandle::create(&fs, "notes").unwrap();
    handle.write_at(0, b"abcdefgh").unwrap();
    handle.write_at(2, b"XY").unwrap();
    assert_eq!(handle.size(), 8);

    let mut buf = [0u8; 8];
    handle.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"abXYefgh");
    // The cursor follows the last write, not the file end.
    handle.append(b"!").unwrap();
    let mut tail = [0u8; 1];
    handle.read_at(4, &mut tail).unwrap();
    assert_eq!(&tail, b"!");
}

#[test]
fn names_are_unique_until_deleted() {
    let fs = FileSystem::format(image_device("name_unique")).unwrap();
    let handle = FileHandle::create(&fs, "a").unwrap();
    handle.close().unwrap();
    assert!(matches!(
        FileHandle::create(&fs, "a"),
        Err(FsError::AlreadyExists)
    ));

    fs.lock().delete("a").unwrap();
    let handle = FileHandle::create(&fs, "a").unwrap();
    assert_eq!(handle.size(), 0);
}

#[test]
fn delete_missing_leaves_bitmaps_untouched() {
    let fs = FileSystem::format(image_device("delete_missing")).unwrap();
    let handle = FileHandle::create(&fs, "keep").unwrap();
    handle.close().unwrap();

    let mut guard = fs.lock();
    let inode_words = guard.inode_bitmap.words().to_vec();
    let data_words = guard.data_bitmap.words().to_vec();
    assert!(matches!(guard.delete("ghost"), Err(FsError::NotFound)));
    assert_eq!(guard.inode_bitmap.words(), &inode_words[..]);
    assert_eq!(guard.data_bitmap.words(), &data_words[..]);
}

#[test]
fn growth_stops_at_block_list_capacity() {
    let fs = FileSystem::format(image_device("growth_cap")).unwrap();
    let mut handle = FileHandle::create(&fs, "big").unwrap();

    let past_end = (MAX_FILE_SECTORS * SECTOR_SIZE) as u32;
    let data_words = fs.lock().data_bitmap.words().to_vec();
    assert!(matches!(
        handle.write_at(past_end, b"x"),
        Err(FsError::FileTooLarge)
    ));
    // An offset whose end position does not fit in u32 is rejected the
    // same way, not wrapped.
    assert!(matches!(
        handle.write_at(u32::MAX, b"xy"),
        Err(FsError::FileTooLarge)
    ));
    // The failed write reserved nothing.
    assert_eq!(handle.sectors_allocated(), 1);
    assert_eq!(fs.lock().data_bitmap.words(), &data_words[..]);

    // The last in-range byte is still writable.
    handle.write_at(past_end - 1, b"x").unwrap();
    assert_eq!(handle.sectors_allocated(), MAX_FILE_SECTORS as u32);
    assert_eq!(handle.size(), past_end);
}

#[test]
fn files_never_share_sectors() {
    let fs = FileSystem::format(image_device("disjoint_sectors")).unwrap();
    let mut seen = HashSet::new();
    for name in ["one", "two", "three"] {
        let mut handle = FileHandle::create(&fs, name).unwrap();
        handle.append(&vec![0xA5u8; 1500]).unwrap();
        for &sector in handle.sectors() {
            assert!(seen.insert(sector), "sector {sector} handed out twice");
        }
        handle.close().unwrap();
    }
}

#[test]
fn contents_survive_remount() {
    let device = image_device("remount");
    {
        let fs = FileSystem::format(device.clone()).unwrap();
        let mut handle = FileHandle::create(&fs, "state").unwrap();
        handle.write_at(0, b"persisted").unwrap();
        handle.close().unwrap();
    }
    let fs = FileSystem::mount(device).unwrap();
    let mut handle = FileHandle::open(&fs, "state").unwrap();
    assert_eq!(handle.size(), 9);
    let mut buf = [0u8; 9];
    handle.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"persisted");
}

#[test]
fn mount_formats_a_blank_image() {
    let fs = FileSystem::mount(image_device("mount_blank")).unwrap();
    let handle = FileHandle::create(&fs, "first").unwrap();
    handle.close().unwrap();

    let listing: Vec<FileInfo> = list_all(&fs).collect::<Result<_, _>>().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "first");
    assert_eq!(listing[0].used_bytes, 0);
}

#[test]
fn first_file_lands_after_the_metadata_region() {
    let fs = FileSystem::format(image_device("first_sector")).unwrap();
    let handle = FileHandle::create(&fs, "first").unwrap();
    let first_data = (INODE_TABLE_START + TOTAL_INODE_SECTORS) as u32;
    assert_eq!(handle.sectors(), &[first_data]);
}

#[test]
fn listing_restarts_from_scratch() {
    fn names(listing: ListAll) -> Vec<String> {
        listing
            .map(|entry| entry.map(|info| info.name))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    let fs = FileSystem::format(image_device("listing_restart")).unwrap();
    for name in ["a", "b", "c"] {
        FileHandle::create(&fs, name).unwrap().close().unwrap();
    }
    let first = names(list_all(&fs));
    assert_eq!(first, ["a", "b", "c"]);
    // A second pass starts over from inode 0, not where the first ended.
    assert_eq!(names(list_all(&fs)), first);
}

#[test]
fn name_length_is_enforced() {
    let fs = FileSystem::format(image_device("name_length")).unwrap();
    assert!(matches!(
        FileHandle::create(&fs, "0123456789"),
        Err(FsError::NameTooLong)
    ));
    let handle = FileHandle::create(&fs, "123456789").unwrap();
    assert_eq!(handle.name(), "123456789");
}
