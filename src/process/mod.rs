pub mod command_executor;

pub use command_executor::{
    ALLOWED_COMMANDS, CommandError, CommandExecutor, CommandOutput, display_command,
};
