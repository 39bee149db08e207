mod engine_event;
mod media_engine;
mod rtc_engine;

pub use engine_event::*;
pub use media_engine::*;
pub use rtc_engine::*;
