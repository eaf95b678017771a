pub mod compiler;
pub mod executor;
pub mod intent;
pub mod observe;
pub mod rate_limit;
pub mod session;

pub use compiler::compile;
pub use executor::{ExecutionOutcome, Orchestrator};
pub use intent::classify;
pub use observe::Observer;
pub use session::SessionService;
