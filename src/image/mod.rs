//! Docker image naming

pub mod arch;
pub mod name;

pub use arch::{arch_to_platform, assert_canonical_arch, canonical_arch, CANONICAL_ARCHS};
pub use name::{sanitize_image_name, ImageName, Registry};
