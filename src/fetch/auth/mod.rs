pub mod bearer;
pub(crate) mod refresh;

pub use refresh::REFRESH_PATH;
