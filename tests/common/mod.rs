#![allow(dead_code)]

use std::error::Error;

pub use stagedag_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn Error>>;
