use std::path::PathBuf;

/// Data directory from environment variable or default.
pub fn get_data_dir() -> PathBuf {
    std::env::var("SWINGSCAN_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}
