pub mod builder;
pub mod handlers;
pub mod models;
pub mod multipart_parser;
pub mod registry;
pub mod validation;

#[cfg(test)]
mod mod_tests;
