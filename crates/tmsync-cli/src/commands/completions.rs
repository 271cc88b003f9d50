//! `tmsync completions <SHELL>`
//!
//! Usage: `tmsync completions bash > ~/.local/share/bash-completion/completions/tmsync`

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use crate::output::OutputFormat;

#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub async fn execute(&self, _format: OutputFormat) -> Result<ExitCode> {
        self.write_to(&mut io::stdout())?;
        Ok(ExitCode::SUCCESS)
    }

    fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        let mut cmd = crate::Cli::command();
        let bin = cmd.get_name().to_string();
        clap_complete::generate(self.shell, &mut cmd, bin, out);
        out.flush()?;
        Ok(())
    }
}
