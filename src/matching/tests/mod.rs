mod common;

mod compatibility;
mod engine;
mod geo;
