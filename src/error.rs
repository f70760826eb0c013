//! Application error type.
//!
//! Every failure carries the process exit code it maps to:
//!
//! - `2`: usage, input file, or schema problems
//! - `3`: insufficient or misaligned data
//! - `4`: numerical failures (rank-deficient designs, non-finite statistics, rendering)

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Usage, file, or schema error (exit code 2).
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// Not enough usable data, or data that does not line up (exit code 3).
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    /// Numerical failure during estimation or rendering (exit code 4).
    pub fn numeric(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
