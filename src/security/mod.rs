//! Security utilities and validation functions.
//!
//! This module provides security-related functionality including:
//! - Destination mapping that keeps remote paths inside the output root
//! - Credential scrubbing to prevent sensitive data exposure

pub mod credential_scrubber;
pub mod path_validator;

pub use credential_scrubber::{scrub_credentials, scrub_secret};
pub use path_validator::{
    normalize_remote_path, partial_path, validate_component, DestinationMapper,
};
