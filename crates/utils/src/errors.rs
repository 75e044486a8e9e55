use thiserror::Error;

/// Error type for CFG and IR construction or mutation.
///
/// These are precondition violations: the IR handed to an analysis or a
/// transform breaks an invariant that the component relies on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CfgIrError {
    /// The function has no blocks, so there is no entry.
    #[error("no valid entry block found")]
    NoEntryBlock,
    /// A block does not end with a terminator.
    #[error("block {0} has no terminator")]
    MissingTerminator(usize),
    /// A block id does not name a block of the function.
    #[error("unknown block {0}")]
    UnknownBlock(usize),
    /// A value id does not name a value of the function.
    #[error("unknown value %{0}")]
    UnknownValue(u32),
    /// A block's instruction sequence breaks the layout rules.
    #[error("malformed block {block}: {reason}")]
    MalformedBlock { block: usize, reason: String },
    /// A merge node disagrees with the predecessors of its block.
    #[error("invalid merge node %{value} in block {block}: {reason}")]
    InvalidMerge {
        block: usize,
        value: u32,
        reason: String,
    },
    /// A value is used somewhere its definition does not dominate.
    #[error("value %{value} used in block {block} is not dominated by its definition")]
    DominanceViolation { block: usize, value: u32 },
    /// A value is defined more than once.
    #[error("value %{0} is defined more than once")]
    Redefinition(u32),
    /// Graph edges do not match the block's terminator.
    #[error("edges of block {0} disagree with its terminator")]
    EdgeMismatch(usize),
    /// An operand has the wrong type for its instruction.
    #[error("type mismatch in block {block}: {reason}")]
    TypeMismatch { block: usize, reason: String },
}

/// Errors raised while validating user supplied configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The ratio text could not be read as a real number.
    #[error("value `{0}' is not a floating point value")]
    NotANumber(String),
    /// The ratio lies outside of `[0., 1.]`.
    #[error("'{0}' is not in [0., 1.]")]
    OutOfRange(f64),
    /// A pass name that no transform answers to.
    #[error("unknown pass `{0}'")]
    UnknownPass(String),
}

/// Errors that can occur in the seed system.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SeedError {
    #[error("Invalid seed length: expected 64 hex chars, got {0}")]
    InvalidLength(usize),
    #[error("Invalid hexadecimal in seed")]
    InvalidHex,
}

/// Error type for metrics computation.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("CFG is empty or malformed")]
    EmptyCfg,
}

/// Error type for transform operations.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A caller broke an argument precondition (e.g. an empty candidate list).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("core operation failed: {0}")]
    CoreError(#[from] CfgIrError),
    #[error("metrics computation failed: {0}")]
    MetricsError(#[from] MetricsError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur while running the obfuscation pipeline from the CLI.
#[derive(Debug, Error)]
pub enum ObfuscateError {
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// Transform application failed.
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    /// Invalid configuration (ratio, pass list).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Invalid seed.
    #[error("seed error: {0}")]
    Seed(#[from] SeedError),
    /// Input module failed validation.
    #[error("invalid input module: {0}")]
    Ir(#[from] CfgIrError),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
