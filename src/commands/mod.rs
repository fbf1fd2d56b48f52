pub type CmdResult<T> = start_pipeline::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod start;
