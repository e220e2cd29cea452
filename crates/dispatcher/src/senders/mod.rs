//! Sender implementations
//!
//! Contains LogSender, HttpSender and BeanstalkdSender.

mod beanstalkd;
mod http;
mod log;

pub use self::beanstalkd::{BeanstalkdSender, BeanstalkdSenderConfig};
pub use self::http::HttpSender;
pub use self::log::LogSender;
