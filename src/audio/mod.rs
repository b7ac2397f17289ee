pub mod decode;
pub mod frame;
pub mod source;

pub use frame::AudioFrame;
