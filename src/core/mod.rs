pub mod materializer;
pub mod services;
pub mod time;

pub use materializer::{MaterializeReport, Materializer};
pub use time::{Clock, FixedClock, SystemClock};
