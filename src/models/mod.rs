pub mod probe;
pub mod requests;
pub mod service;

pub use probe::{NamedOutcome, Outcome, ProbeResult, SweepEntry, SweepSummary};
pub use service::{NewService, Service, ServiceView, TestRecord};
