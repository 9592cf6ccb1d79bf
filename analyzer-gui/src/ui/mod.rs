//! # UI Module
//!
//! Layout of the feature viewer window.

pub mod main_display;
