pub mod scan_worker;

pub use scan_worker::run as run_scan_worker;
