pub(crate) mod host;
pub(crate) mod repo;
pub(crate) mod session;
pub(crate) mod task;
