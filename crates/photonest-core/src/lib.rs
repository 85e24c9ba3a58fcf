//! photonest-core - Core library for PhotoNest
//!
//! This crate contains the models, local cache, backend clients, repositories
//! and screen state machines shared by every PhotoNest front end.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod otp;
pub mod remote;
pub mod repository;
pub mod resource;
pub mod storage;
pub mod util;
pub mod viewmodel;

pub use error::{Error, Result};
pub use resource::Resource;
