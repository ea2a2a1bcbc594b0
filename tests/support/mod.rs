#![allow(dead_code)]

pub mod domains;
pub mod checks;
