mod batch_tests;
mod common;
