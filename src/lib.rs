// Machine
mod ops;
pub use ops::{sign_extend, Instr, Opcode};
pub mod state;
pub use state::{CondFlag, Memory, Registers, VmState};
mod runtime;
pub use runtime::{RunEnvironment, Status, TrapVector};

// Devices
pub mod input;
pub use input::{ByteInput, InputDevice};
pub mod term;

// Start-up
pub mod loader;
pub use loader::{load_image, load_image_file, ImageInfo};

mod error;
pub use error::RunError;

pub mod env;
pub mod output;
