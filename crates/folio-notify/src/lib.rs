pub mod email;
pub mod transport;

pub use email::{Email, Notifier, Submission};
pub use transport::{EmailTransport, HttpTransport, LogTransport};
