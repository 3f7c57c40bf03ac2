mod file;

pub use file::FileCache;
