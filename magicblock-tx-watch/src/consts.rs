// Auto Refresh Defaults
pub const DEFAULT_AUTO_REFRESH_INTERVAL_MS: u64 = 2_000;

/// Consecutive zero confirmation observations after which we stop polling
pub const DEFAULT_ZERO_CONFIRMATION_BAILOUT: u32 = 5;

// Signatures
pub const SIGNATURE_BYTES: usize = 64;
