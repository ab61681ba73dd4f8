use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Command;

/// Flag the agent CLI takes to extend its system prompt from a file.
pub const SYSTEM_PROMPT_FLAG: &str = "--append-system-prompt";

/// The program, arguments and extra environment for the supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
}

impl AgentCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// `<bin> --append-system-prompt <prompt_file> <user args...>`
    pub fn agent<I, S>(bin: &Path, system_prompt_file: &Path, user_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self::new(bin)
            .arg(SYSTEM_PROMPT_FLAG)
            .arg(system_prompt_file)
            .args(user_args)
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub(crate) fn display_program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_command_puts_prompt_flag_before_user_args() {
        let command = AgentCommand::agent(
            Path::new("/opt/agent/bin/claude"),
            Path::new("/home/u/.agents/system-prompt.md"),
            ["--resume", "abc"],
        );

        assert_eq!(command.program(), "/opt/agent/bin/claude");
        assert_eq!(
            command.get_args(),
            &[
                OsString::from("--append-system-prompt"),
                OsString::from("/home/u/.agents/system-prompt.md"),
                OsString::from("--resume"),
                OsString::from("abc"),
            ]
        );
    }

    #[test]
    fn test_env_reaches_std_command() {
        let command = AgentCommand::new("env").env("AGENT_SESSION_ID", "s1");
        let std_command = command.to_command();
        let envs: Vec<_> = std_command.get_envs().collect();
        assert_eq!(envs, vec![(OsStr::new("AGENT_SESSION_ID"), Some(OsStr::new("s1")))]);
    }
}
