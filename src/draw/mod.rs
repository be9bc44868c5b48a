pub(crate) mod image;
pub(crate) mod target;
pub(crate) mod task;
