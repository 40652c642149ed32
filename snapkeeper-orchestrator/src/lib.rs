pub mod backup_job;
pub mod image_gc_job;
pub mod inventory;
pub mod logger;
pub mod maintenance;
pub mod notifier;
pub mod provider_manager;
pub mod retention;
pub mod retry;
pub mod settings;
pub mod snapshot_gc_job;
pub mod unused_images;

pub use maintenance::{run, RunReport};
pub use settings::Settings;
