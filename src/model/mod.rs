mod message;
mod newsletter;
mod submission;
mod subscription;
mod user;

pub use message::*;
pub use newsletter::*;
pub use submission::*;
pub use subscription::*;
pub use user::*;
