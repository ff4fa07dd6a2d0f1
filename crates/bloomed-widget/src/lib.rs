pub mod api;
pub mod controller;
pub mod error;
pub mod session;

pub use api::{DreamApi, HttpDreamApi};
pub use controller::{ChatWidget, Notice, NoticeLevel, Phase};
pub use error::{Result, WidgetError};
pub use session::SessionManager;
