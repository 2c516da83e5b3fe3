//! Channel session: the controller that owns the roster, the async loop
//! that drives it, and the types both expose.

mod controller;
mod driver;
mod types;


pub use controller::{ChannelSession, SessionChannels};
pub use driver::SessionHandle;
pub use types::{SessionConfig, SessionEvent, SessionSnapshot, SessionState};
