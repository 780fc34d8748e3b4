//! Scenario tests driven by an in-process mock TV.
//!
//! The fixtures stand up a real WebSocket server per test, so these
//! exercise the full path (frame serialization, the background receive
//! task, correlation, the pairing flow) with everything short of an actual
//! TV.


mod api_tests;
mod link_tests;
