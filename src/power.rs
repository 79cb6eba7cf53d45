use crate::error::PowerError;
use std::process::Command;
use tracing::info;

pub(crate) trait PowerControl {
    /// Halts the machine. `Ok` means the halt was started.
    fn power_off(&self) -> Result<(), PowerError>;
}

/// Runs an external command, `sudo shutdown -h now` unless configured otherwise.
#[derive(Debug, Clone)]
pub(crate) struct SystemPower {
    command: Vec<String>,
}

impl SystemPower {
    pub(crate) fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl PowerControl for SystemPower {
    fn power_off(&self) -> Result<(), PowerError> {
        let (program, args) = self.command.split_first().ok_or(PowerError::NoCommand)?;

        info!(command = ?self.command, "Good bye!");
        let status = Command::new(program).args(args).status()?;
        if !status.success() {
            return Err(PowerError::Failed(status));
        }

        Ok(())
    }
}
