//! Low-level I/O: decompression detection and typed CSV batches.

pub mod compression;
pub mod csv;
