pub mod scheduler;
pub mod transport;

pub use scheduler::{
    PartScheduler, PitchSet, RhythmScheduler, TriggerEvent, TriggerKind,
    build_part_schedulers,
};
pub use transport::{BufferWindow, Transport, TransportState};
