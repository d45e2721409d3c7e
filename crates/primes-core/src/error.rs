use std::fmt;

/// Machine-readable error codes for scripts wrapping the `primes` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidConfigValue,
    ShardWidthOutOfRange,
    InvalidStoredValue,
    ShardWidthMismatch,
    ShardSizeMisaligned,
    ShardOrderViolation,
    ShardGap,
    ShardManifestMismatch,
    StoreAheadOfSequence,
    ShardReadFailed,
    ShardWriteFailed,
    LockContention,
    EvenCandidate,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidConfigValue => "E1002",
            Self::ShardWidthOutOfRange => "E3001",
            Self::InvalidStoredValue => "E3002",
            Self::ShardWidthMismatch => "E3003",
            Self::ShardSizeMisaligned => "E3004",
            Self::ShardOrderViolation => "E3005",
            Self::ShardGap => "E3006",
            Self::ShardManifestMismatch => "E3007",
            Self::StoreAheadOfSequence => "E3008",
            Self::ShardReadFailed => "E5001",
            Self::ShardWriteFailed => "E5002",
            Self::LockContention => "E5003",
            Self::EvenCandidate => "E9001",
            Self::InternalUnexpected => "E9002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfigValue => "Invalid config value",
            Self::ShardWidthOutOfRange => "Shard width outside 1..=8",
            Self::InvalidStoredValue => "Stored value is not a valid prime",
            Self::ShardWidthMismatch => "Stored value has the wrong byte width for its shard",
            Self::ShardSizeMisaligned => "Shard size is not a multiple of its width",
            Self::ShardOrderViolation => "Stored primes are not strictly ascending",
            Self::ShardGap => "Shard present after a missing width",
            Self::ShardManifestMismatch => "Shard manifest mismatch",
            Self::StoreAheadOfSequence => "Store holds more primes than the sequence being saved",
            Self::ShardReadFailed => "Shard read failed",
            Self::ShardWriteFailed => "Shard write failed",
            Self::LockContention => "Lock contention",
            Self::EvenCandidate => "Search would start on an even candidate",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in primes.toml and retry."),
            Self::InvalidConfigValue => Some("batch_size must be at least 1."),
            Self::ShardWidthOutOfRange
            | Self::InvalidStoredValue
            | Self::ShardWidthMismatch
            | Self::ShardSizeMisaligned
            | Self::ShardOrderViolation
            | Self::ShardGap => {
                Some("The store is corrupt or foreign. Run `primes verify` and repair by hand.")
            }
            Self::ShardManifestMismatch => {
                Some("A sealed shard changed after it was closed. Restore it from a backup.")
            }
            Self::StoreAheadOfSequence => {
                Some("Load the sequence from this store before saving into it.")
            }
            Self::ShardReadFailed => Some("Check that the store directory is readable."),
            Self::ShardWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Another `primes run` is using this store."),
            Self::EvenCandidate | Self::InternalUnexpected => {
                Some("This is a bug. Report it with the store summary from `primes status`.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
