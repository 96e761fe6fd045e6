pub mod lead;
pub mod store;
pub mod subscription;
pub mod usage;
pub mod user;

pub use lead::*;
pub use store::*;
pub use subscription::*;
pub use usage::*;
pub use user::*;
