pub mod key;
pub mod store;

pub use key::{KeyGenerator, KEY_TRIES};
pub use store::{Session, SessionStore, TransferStatus};
