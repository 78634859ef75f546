use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Append-only blob store addressed by `(offset, length)`.
pub struct DataFile {
    out: BufWriter<File>,
    /// First free byte; every append lands here.
    free: u64,
}

impl DataFile {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::options().read(true).write(true).create(true).truncate(true).open(path)?;
        Ok(Self { out: BufWriter::new(file), free: 0 })
    }

    /// Opens an existing data file for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let free = file.metadata()?.len();
        Ok(Self { out: BufWriter::new(file), free })
    }

    /// Writes `bytes` at the free pointer and returns where they start.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.free;
        self.out.write_all(bytes)?;
        self.free += bytes.len() as u64;
        Ok(offset)
    }

    pub fn read(&mut self, offset: u64, length: u32) -> Result<Vec<u8>> {
        if offset + length as u64 > self.free {
            return Err(Error::corrupt(format!(
                "blob [{offset}, +{length}) lies past the end of the data file ({} bytes)",
                self.free
            )));
        }
        self.out.flush()?;
        let file = self.out.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        file.seek(SeekFrom::Start(self.free))?;
        Ok(buf)
    }

    pub fn free(&self) -> u64 {
        self.free
    }

    pub fn sync(&mut self) -> Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(())
    }
}

/// Slice of a mapped data file, bounds-checked.
pub(crate) fn blob_at(bytes: &[u8], offset: u64, length: u32) -> Result<&[u8]> {
    let start = offset as usize;
    bytes.get(start..start + length as usize).ok_or_else(|| {
        Error::corrupt(format!(
            "blob [{offset}, +{length}) lies past the end of the data file ({} bytes)",
            bytes.len()
        ))
    })
}
