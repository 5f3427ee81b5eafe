pub mod checker;
pub mod error;
pub mod guard;
pub mod pattern;

pub use checker::{Checker, RegexChecker, RulesChecker, StringExactChecker, StringFuzzyChecker};
pub use error::{CheckError, GuardError};
pub use guard::Guard;
