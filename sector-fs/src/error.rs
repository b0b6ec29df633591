#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    PathNotFound,
    NotADirectory,
    Duplicate,
    DirectoryFull,
    NoFreeSector,
    IsADirectory,
    BadDescriptor,
    InvalidPath,
}
