#![allow(dead_code)]

pub mod gpu;
pub mod test_utils;
