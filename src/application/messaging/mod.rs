//! Message handling - parsing, checks and dispatching

pub mod dispatcher;
pub mod format;
pub mod middleware;
pub mod parser;

pub use dispatcher::{Dispatch, Dispatcher};
pub use middleware::{ConcurrencyGate, CooldownMiddleware, LoggingMiddleware, Middleware, RoleMiddleware};
pub use parser::{Arguments, MessageParser};
