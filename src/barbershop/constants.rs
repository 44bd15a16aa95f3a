pub const DEFAULT_BARBERS: usize = 1;
pub const DEFAULT_CHAIRS: usize = 3;
pub const DEFAULT_CUSTOMERS: usize = 10;

// ==================== SIMULATION TIMING ====================
pub const ARRIVAL_MAX_MILLIS: u64 = 400;
pub const HAIRCUT_MIN_MILLIS: u64 = 100;
pub const HAIRCUT_MAX_MILLIS: u64 = 400;
