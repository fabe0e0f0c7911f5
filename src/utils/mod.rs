pub mod logging;

pub use logging::{init_logging, init_test_logging, log_system_info};
