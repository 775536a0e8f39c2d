use thiserror::Error;

/// Every failure the option model, the program tree, the parser, and the
/// DAG runner can produce. Kept as one enum, rather than per-subsystem
/// enums, because the two subsystems share a boundary: a command function
/// runs under the parser and may itself build and run a `Graph`, so its
/// errors need to compose into the same `Result`.
#[derive(Debug, Error, Clone)]
pub enum Error {
    // ==================== Parse-time ====================
    #[error("unknown option: '{0}'")]
    UnknownOption(String),

    #[error("ambiguous argument '{0}': matches {1:?}")]
    AmbiguousArgument(String, Vec<String>),

    #[error("missing argument for option '{0}'")]
    MissingArgument(String),

    #[error("option '{0}' requires a value but the next argument looks like an option: '{1}'")]
    ArgumentWithDash(String, String),

    #[error("argument '{0}' for option '{1}' is not in key=value form")]
    ArgumentIsNotKeyValue(String, String),

    #[error("cannot convert '{0}' to an integer for option '{1}'")]
    ConvertToInt(String, String),

    #[error("cannot convert '{0}' to a float for option '{1}'")]
    ConvertToFloat(String, String),

    #[error("value '{0}' is not a valid value for option '{1}': expected one of {2:?}")]
    InvalidValue(String, String, Vec<String>),

    #[error("missing required option '{0}'{}", .1.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    MissingRequiredOption(String, Option<String>),

    #[error("unknown command: '{0}' (known commands: {1:?})")]
    UnknownCommand(String, Vec<String>),

    #[error("command '{0}' has no defined command function")]
    NoCommandFunction(String),

    /// Help was printed; distinguishable so callers can choose an exit code.
    #[error("help requested")]
    HelpCalled,

    // ==================== DAG runner ====================
    #[error("task is nil")]
    TaskNil,

    #[error("task id is empty")]
    TaskIdEmpty,

    #[error("task '{0}' has no function")]
    TaskFunctionMissing(String),

    #[error("duplicate task id: '{0}'")]
    TaskDuplicate(String),

    #[error("task not found: '{0}'")]
    TaskNotFound(String),

    #[error("task '{0}' already depends on '{1}'")]
    TaskDependencyDuplicate(String, String),

    #[error("graph has a cycle")]
    GraphHasCycle,

    #[error("task '{0}' skipped because a prior task failed")]
    TaskSkipped(String),

    #[error("run canceled")]
    Canceled,

    #[error("task '{0}' failed: {1}")]
    TaskFailed(String, String),

    // ==================== Generic ====================
    #[error("internal error: {0}")]
    Internal(String),

    #[error("command mismatch: expected '{expected}', got '{actual}'")]
    CommandMismatch { expected: String, actual: String },

    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// The crate's standard result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A collection of errors accumulated during definition or execution,
/// rendered with a stable envelope (spec: "a stable envelope that lists
/// each error").
#[derive(Debug, Default, Clone)]
pub struct ErrorEnvelope {
    errors: Vec<Error>,
}

impl ErrorEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.errors
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} error(s):", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, e)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorEnvelope {}
