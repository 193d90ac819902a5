// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    ConfigOverrides, build_config, csv_paths, default_log_directive, expand_path, load_config,
    progress_message, short_path,
};
