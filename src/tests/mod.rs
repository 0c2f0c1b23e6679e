//! Cross-module tests driven through the in-memory chain client

mod end_to_end_tests;
mod nonce_sequencer_tests;
mod sweep_tests;
