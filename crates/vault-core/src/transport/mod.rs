pub mod channel;

pub use channel::PushChannel;
