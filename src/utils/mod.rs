pub mod http;
pub mod image;
pub mod logging;
pub mod timing;
