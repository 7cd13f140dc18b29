pub mod encryption;
pub mod fanout;
pub mod push;
pub mod store;
pub mod subscriptions;
pub mod vapid;

#[cfg(feature = "kv_binding")]
pub mod worker_kv;

pub use fanout::*;
pub use push::*;
pub use store::*;
pub use subscriptions::*;
pub use vapid::*;
