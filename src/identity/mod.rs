pub(crate) mod extractors;

pub use extractors::{Principal, Role};
