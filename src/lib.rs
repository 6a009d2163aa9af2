//! Client for the rucaptcha text protocol: submit a captcha, poll until a
//! worker answers, and report bad answers.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod image;
pub mod response;
pub mod solver;

pub use config::{Language, NumericMode, SolveHints, SolverConfig};
pub use dispatch::{CaptchaTask, TaskId};
pub use error::{SolveFailure, SolverError};
pub use response::{ServiceReply, classify};
pub use solver::{CaptchaSolver, Solution, SolveResult};
