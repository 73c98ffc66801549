pub mod audit;
pub mod dispatch;
pub mod otp;
pub mod relay;
pub mod resolver;
pub mod template;
