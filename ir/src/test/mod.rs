//! Test suite for the IR crate.

mod property;
mod unit;
