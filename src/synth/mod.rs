pub mod bank;
pub mod envelope;
pub mod instrument;
pub mod oscillator;
pub mod reverb;
pub mod voice;

pub use bank::{InstrumentBank, RoleSamples};
pub use envelope::{Adsr, AdsrParams};
pub use instrument::Instrument;
pub use oscillator::Oscillator;
pub use reverb::{Reverb, ReverbParams};
pub use voice::Voice;
