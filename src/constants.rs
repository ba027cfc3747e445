/// Currency tag for cent-denominated accounts (stored amounts are 100x the real value)
pub const CENT_CURRENCY: &str = "CEN";

/// Decimal precision for monetary and volume fields
pub const MONEY_DECIMAL_PRECISION: u32 = 4;

/// Batch size for directory lookups (bounded per round trip)
pub const DIRECTORY_BATCH_SIZE: usize = 1000;

/// Watermark dataset name for the client PnL pipeline output
pub const WATERMARK_DATASET: &str = "pnl_client";

/// Watermark partition key (single partition covers the whole output)
pub const WATERMARK_PARTITION_ALL: &str = "all";

/// Maximum number of zipcode change details logged per run
pub const ZIPCODE_CHANGE_LOG_LIMIT: usize = 20;
