pub mod cancel;
pub mod perf;

pub use cancel::StopSignal;
pub use perf::Stopwatch;
