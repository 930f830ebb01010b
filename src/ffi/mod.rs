pub mod bindings;
pub mod syscall;

/// Size of one kernel input record on this target.
pub const RAW_EVENT_SIZE: usize = size_of::<bindings::input_event>();
