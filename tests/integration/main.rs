//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the panel against mock
//! adapters.  All tests run on the host with no real hardware required.

mod mock_hw;
mod panel_tests;
mod provisioning_flow_tests;
