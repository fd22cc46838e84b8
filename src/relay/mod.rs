pub mod archive;
pub mod coordinator;
pub mod reaper;

pub use archive::{write_archive, ArchiveSummary, FILE_FIELD};
pub use coordinator::TransferCoordinator;
pub use reaper::Reaper;
