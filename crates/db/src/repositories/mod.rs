//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Document mutations run inside a
//! transaction holding the row lock, so each is atomic on its document.

pub mod change_log_repo;
pub mod deck_repo;
pub mod slide_repo;
