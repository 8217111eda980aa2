pub mod listener;
pub mod sender;
pub mod session;

pub use listener::Listener;
pub use sender::RenderSender;
pub use session::{Session, SessionEnd};
