//! Integration tests for the context graph engine

mod clearing;
mod refresh;
