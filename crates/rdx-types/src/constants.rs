//! System-wide constants for the RDX accounting engine.

/// Number of days in one check-in streak cycle. Day 8 starts over at day 1.
pub const STREAK_CYCLE_DAYS: u8 = 7;

/// Default daily check-in reward per streak day (day 1 ..= day 7), whole units.
pub const DEFAULT_DAILY_REWARDS: [i64; STREAK_CYCLE_DAYS as usize] = [5, 10, 15, 20, 25, 30, 50];

/// Default asset in which check-in, referral and bonus rewards are paid.
pub const DEFAULT_REWARD_ASSET: &str = "RDX";

/// Assets a wallet can hold unless the deployment overrides the list.
pub const DEFAULT_SUPPORTED_ASSETS: [&str; 5] = ["BTC", "ETH", "USDT", "PI", "RDX"];

/// Default reward credited to a referrer per completed referral, whole units.
pub const DEFAULT_REFERRAL_REWARD: i64 = 10;

/// Maximum decimal places accepted on any amount.
pub const AMOUNT_PRECISION: u32 = 8;

/// Prefix of every referral code.
pub const REFERRAL_CODE_PREFIX: &str = "RDX";

/// Number of hex characters following the prefix in a referral code.
pub const REFERRAL_CODE_HEX_LEN: usize = 8;

/// Attempts at deriving a collision-free referral code before giving up.
pub const MAX_REFERRAL_CODE_ATTEMPTS: u32 = 16;

/// External deposit references remembered per user for de-duplication.
pub const DEFAULT_DEPOSIT_DEDUP_CAPACITY: usize = 10_000;

/// Default page size for ledger listings.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Hard upper bound on ledger listing page size.
pub const MAX_PAGE_LIMIT: usize = 500;

/// Days shown in the check-in status calendar (today and the six before it).
pub const CHECK_IN_CALENDAR_DAYS: u8 = 7;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "RDX Ledger";
