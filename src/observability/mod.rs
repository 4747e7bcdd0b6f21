pub mod diagnostics;
pub mod metrics;
