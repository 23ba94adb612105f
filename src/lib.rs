//! Headless core of a movie/TV discovery client: a typed catalog client,
//! a favorites store with auth, and the filtering/recommendation logic a
//! presentation shell renders.

pub mod app;
pub mod engine;
pub mod models;
pub mod recommend;
pub mod search;
pub mod supabase;
pub mod tmdb;
