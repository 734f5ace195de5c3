//! Process exit codes. Scripts depend on these values.

pub const SUCCESS: i32 = 0;
pub const CONFIG_ERROR: i32 = 2; // Config unreadable, invalid or yields no checks
