pub mod dsp_utils;
pub mod export;
pub mod mixer;
pub mod parameters;
pub mod render;
pub mod stream;

pub use mixer::{ANALYSIS_SIZE, MixMaster};
pub use parameters::{AtomicF32, SharedParams};
pub use render::RenderCore;
pub use stream::DeviceStream;
