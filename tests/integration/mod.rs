//! Integration tests for elastic_executor
//!
//! Every test builds its own executor with real worker threads, so they run
//! in parallel without a shared fixture.
//!
//! Run with: cargo test --test integration


mod admission;
mod lifecycle;
mod renewal;
