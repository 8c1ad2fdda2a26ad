use clap::{Arg, Command};
use std::path::PathBuf;

pub const ARG_STATIC_DIR: &str = "static-dir";
pub const ARG_AVATAR_SIZE: &str = "avatar-size";

#[derive(Debug)]
pub struct Options {
    pub static_dir: PathBuf,
    pub avatar_size: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &clap::ArgMatches) -> anyhow::Result<Self> {
        let static_dir = matches
            .get_one::<PathBuf>(ARG_STATIC_DIR)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_STATIC_DIR}"))?;
        let avatar_size = matches
            .get_one::<u32>(ARG_AVATAR_SIZE)
            .copied()
            .unwrap_or(125);

        Ok(Self {
            static_dir,
            avatar_size,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_STATIC_DIR)
                .long("static-dir")
                .help("Directory served under /static; avatars go to <dir>/profile_pics")
                .env("SCRIBE_STATIC_DIR")
                .default_value("static")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_AVATAR_SIZE)
                .long("avatar-size")
                .help("Bounding box in pixels for uploaded avatars")
                .env("SCRIBE_AVATAR_SIZE")
                .default_value("125")
                .value_parser(clap::value_parser!(u32).range(1..=4096)),
        )
}
