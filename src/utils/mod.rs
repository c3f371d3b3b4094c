pub mod progress;
pub mod prompt_budgeter;
pub mod rate_limiter;
pub mod threads;
