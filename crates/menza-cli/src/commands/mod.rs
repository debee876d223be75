pub mod format;
pub mod show;
pub mod status;
pub mod sync;
pub mod wipe;
