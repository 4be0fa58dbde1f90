//! Data Transfer Objects for status responses.

pub mod health;
