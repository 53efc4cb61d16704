pub mod call;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod fallback;
pub mod session;
pub mod state;

// Re-export common types
pub use call::{CallIdentity, CallRecord, PhoneState};
pub use config::{AgentConfig, TransportMode};
pub use driver::SeatDriver;
pub use error::{AutoseatError, Result};
pub use event::{CallEvent, SessionStats, SessionSummary};
pub use session::{AgentSession, Availability, CookieJar};
pub use state::{ControllerState, StopReason};
