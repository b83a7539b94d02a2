//! Radio driver implementations.
//!
//! The real driver lives in the platform firmware that embeds this crate;
//! what ships here is the scripted [`MockRadioDriver`] used by the test
//! suites and by the headless binary.

pub mod mock;

pub use mock::{AssociateOutcome, MockRadioDriver};
