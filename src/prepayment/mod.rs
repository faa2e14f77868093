pub mod simulator;

pub use simulator::{apply, simulate, AppliedPrepayment, SimulationResult};
