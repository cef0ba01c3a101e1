pub mod deletion_logs;

pub use deletion_logs::{LogAction, LogStatus};
