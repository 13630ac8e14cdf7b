//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the controller against
//! mock adapters and a simulated oven.  All tests run on the host with no
//! real hardware required.

mod controller_tests;
mod mock_hw;
