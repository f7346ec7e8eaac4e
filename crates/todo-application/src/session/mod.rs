//! Session lifecycle.
//!
//! `SessionController` is the single owner of who is signed in. It depends on
//! the cache only through [`todo_core::CacheInvalidator`] and on the front end
//! only through [`todo_core::Navigator`].

mod controller;

pub use controller::SessionController;
