/// Default limit on nested calls.
///
/// This bounds guest call depth only. Native stack use also grows with
/// scope nesting, and is guarded separately: a call or scope entered with
/// less than the interpreter's red zone of native stack left traps with
/// `CallStackExhausted` whatever this limit is.
pub const DEFAULT_MAX_CALL_DEPTH: u32 = 1_000;

/// Execution limits applied to every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub(crate) max_call_depth: u32,
    pub(crate) fuel: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls nested deeper than this trap with `CallStackExhausted`.
    pub fn max_call_depth(mut self, depth: u32) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Nodes a single top-level invocation may execute before trapping
    /// with `OutOfFuel`. `None` means unlimited.
    pub fn fuel(mut self, fuel: Option<u64>) -> Self {
        self.fuel = fuel;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            fuel: None,
        }
    }
}

/// Shared execution configuration.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Engine { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
