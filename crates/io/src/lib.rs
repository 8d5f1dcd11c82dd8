//! `reconbot-io`: turns attachment bytes into tables and keeps the history
//! log on disk.

pub mod attachment;
pub mod csv;
pub mod gzip;
pub mod history;
pub mod sources;
pub mod xlsx;

pub use attachment::{AttachmentSource, Attachments, DirectoryInbox, FilePair};
pub use history::JsonFileStore;
pub use sources::{read_attachments, read_source_a, read_source_b};
