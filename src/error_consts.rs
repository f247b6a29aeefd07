pub const SAMPLE_OUT_OF_ORDER: &str = "TSDB: samples aren't sorted by timestamp ascending";
pub const INVALID_CHUNK_COMPRESSION: &str = "TSDB: invalid chunk compression";
pub const INVALID_DUPLICATE_POLICY: &str = "TSDB: invalid duplicate policy";
pub const EMPTY_CHUNK_LAST_TIMESTAMP: &str = "Trying to get the last timestamp of empty chunk";
pub const EMPTY_CHUNK_LAST_VALUE: &str = "Trying to get the last value of empty chunk";
