use crate::error::{Error, Result};
use crate::storage::entry::{Entry, ENTRY_SIZE};
use memmap2::Mmap;
use roaring::RoaringBitmap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Anything that can hand out dictionary slots by bucket number.
///
/// Probing is linear and wraps around the table; a full cycle without an
/// empty slot ends the scan.
pub trait SlotSource {
    fn table_size(&self) -> u64;

    fn read_slot(&self, bucket: u64) -> Result<Option<Entry>>;

    /// First entry on the chain starting at `primary` whose secondary
    /// hash matches. Hitting an empty slot means the token is absent.
    fn find_entry(&self, primary: u64, secondary: i32) -> Result<Option<Entry>> {
        let table_size = self.table_size();
        let mut bucket = primary % table_size;
        for _ in 0..table_size {
            match self.read_slot(bucket)? {
                None => return Ok(None),
                Some(entry) if entry.secondary_hash == secondary => return Ok(Some(entry)),
                Some(_) => bucket = (bucket + 1) % table_size,
            }
        }
        Ok(None)
    }
}

/// File-backed dictionary used while writing and merging generations.
pub struct DictionaryFile {
    file: File,
    table_size: u64,
    /// Buckets written through this handle; `None` for files opened read-only,
    /// whose occupancy is read from disk.
    occupied: Option<RoaringBitmap>,
    collisions: u64,
}

impl DictionaryFile {
    /// Creates (or truncates) a dictionary for writing.
    pub fn create(path: &Path, table_size: u64) -> Result<Self> {
        let file = File::options().read(true).write(true).create(true).truncate(true).open(path)?;
        Ok(Self { file, table_size, occupied: Some(RoaringBitmap::new()), collisions: 0 })
    }

    pub fn open(path: &Path, table_size: u64) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self { file, table_size, occupied: None, collisions: 0 })
    }

    /// Overwrites whatever the bucket held.
    pub fn write(&mut self, bucket: u64, entry: &Entry) -> Result<()> {
        self.file.seek(SeekFrom::Start(bucket * ENTRY_SIZE as u64))?;
        self.file.write_all(&entry.encode())?;
        if let Some(occupied) = self.occupied.as_mut() {
            occupied.insert(bucket as u32);
        }
        Ok(())
    }

    pub fn read(&self, bucket: u64) -> Result<Option<Entry>> {
        let mut buf = [0u8; ENTRY_SIZE];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(bucket * ENTRY_SIZE as u64))?;
        match file.read_exact(&mut buf) {
            Ok(()) => Entry::decode(&buf),
            // past the end of a sparse table
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_occupied(&self, bucket: u64) -> Result<bool> {
        match &self.occupied {
            Some(occupied) => Ok(occupied.contains(bucket as u32)),
            None => Ok(self.read(bucket)?.is_some()),
        }
    }

    /// First free bucket at or after `primary`, wrapping. Every occupied
    /// bucket passed over counts as a collision.
    pub fn find_slot(&mut self, primary: u64) -> Result<u64> {
        let mut bucket = primary % self.table_size;
        for _ in 0..self.table_size {
            if !self.is_occupied(bucket)? {
                return Ok(bucket);
            }
            self.collisions += 1;
            bucket = (bucket + 1) % self.table_size;
        }
        Err(Error::TableFull { table_size: self.table_size })
    }

    /// Places `entry` in the first free bucket of its chain.
    pub fn insert(&mut self, primary: u64, entry: &Entry) -> Result<u64> {
        let bucket = self.find_slot(primary)?;
        self.write(bucket, entry)?;
        Ok(bucket)
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl SlotSource for DictionaryFile {
    fn table_size(&self) -> u64 {
        self.table_size
    }

    fn read_slot(&self, bucket: u64) -> Result<Option<Entry>> {
        self.read(bucket)
    }
}

/// Read-only dictionary mapped into memory for query time.
pub struct MappedDictionary {
    map: Option<Mmap>,
    table_size: u64,
}

impl MappedDictionary {
    pub fn open(path: &Path, table_size: u64) -> Result<Self> {
        Ok(Self { map: map_file(path)?, table_size })
    }
}

impl SlotSource for MappedDictionary {
    fn table_size(&self) -> u64 {
        self.table_size
    }

    fn read_slot(&self, bucket: u64) -> Result<Option<Entry>> {
        let bytes: &[u8] = self.map.as_deref().unwrap_or_default();
        let start = bucket as usize * ENTRY_SIZE;
        match bytes.get(start..start + ENTRY_SIZE) {
            Some(slot) => Entry::decode(slot),
            None => Ok(None),
        }
    }
}

/// Maps a file read-only; empty files map to `None`.
pub(crate) fn map_file(path: &Path) -> Result<Option<Mmap>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // Canonical files are never modified once promoted.
    let map = unsafe { Mmap::map(&file)? };
    Ok(Some(map))
}
