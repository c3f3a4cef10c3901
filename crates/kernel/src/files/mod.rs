//! Open files as the guest sees them.
//!
//! A [`Descriptor`] is one open file description: shared by `dup` and
//! across fork through its `Arc`, released when the last holder drops it.

pub mod descriptor;
pub mod pipe;
pub mod socket;
pub mod table;
pub mod vfs;

pub use descriptor::{Access, DirEntry, Descriptor, FileStat, Kind, StatusFlags, Stream};
pub use pipe::{pipe, PipeReader, PipeWriter};
pub use socket::Socket;
pub use table::{FileTable, MAX_FDS};
pub use vfs::{FsStat, Target, Vfs};
