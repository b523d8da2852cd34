mod http_app;

pub use http_app::{reply, ApiError, App, AppConfig, AppError, HandlerSpec, JSON_CONTENT_TYPE};
