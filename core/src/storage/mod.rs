//! Binary building blocks of the on-disk index: the fixed-width dictionary
//! entry, the hash-table dictionary file and the append-only data file.

pub mod data;
pub mod dictionary;
pub mod entry;

pub use data::DataFile;
pub use dictionary::{DictionaryFile, MappedDictionary, SlotSource};
pub use entry::{Entry, ENTRY_SIZE};
