pub mod common;

mod error_classification;
