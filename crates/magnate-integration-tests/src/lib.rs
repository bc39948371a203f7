//! End-to-end tests for the Magnate node, driving the HTTP router the way
//! a client would. See `tests/api.rs`.
