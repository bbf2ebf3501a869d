//! End-to-end tests for the flood sensor daemon.
//!
//! These run the real HTTP client against a local stand-in for the Environment
//! Agency API, so they need no network access.

mod mock_api;
