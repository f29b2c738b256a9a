//! Scanners that inspect the working directory on disk.

pub mod workdir;

pub use workdir::WorkdirInfo;
