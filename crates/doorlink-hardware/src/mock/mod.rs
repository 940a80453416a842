//! Mock hardware for tests and the emulator.
//!
//! Each mock is created as a `(device, handle)` pair: the device goes to the
//! code under test, the handle stays with the test to drive or inspect it.

mod inputs;
mod outputs;
mod wiegand;

pub use inputs::{MockInputs, MockInputsHandle};
pub use outputs::{MockOutputs, MockOutputsHandle, OutputChange};
pub use wiegand::MockWiegandReader;
