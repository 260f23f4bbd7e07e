//! Just a list of all the exit codes in our process.

pub const LOGGING_HANDLER_INSTALL_FAILURE: i32 = 1;
pub const ARGUMENT_PARSING_FAILURE: i32 = 2;
pub const INITIAL_CONNECT_FAILURE: i32 = 3;
