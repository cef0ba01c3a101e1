pub mod deletion_logs;

pub use deletion_logs::{
    DeletionLogsDao, LogOrderBy, LogQueryParams, LogStatistics, NewLogEntry, SortOrder,
    StatsPeriod, TrendBucket,
};
