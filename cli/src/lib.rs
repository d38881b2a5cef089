pub mod logging;
pub mod render;
pub mod request;
pub mod session;

pub use request::{PairRequest, PathRequest};
pub use session::Session;
