//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the yatube binary.
#[derive(Debug, Parser)]
#[command(name = "yatube", version, about = "Yatube blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "YATUBE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (the default).
    Serve(ServeArgs),
    /// Apply pending database migrations and exit.
    Migrate,
    /// Create a group.
    CreateGroup(CreateGroupArgs),
    /// Delete a group. Its posts stay, without a group.
    DeleteGroup {
        /// Slug of the group.
        slug: String,
    },
    /// Delete a user with their posts, comments and follow edges.
    DeleteUser {
        /// Username of the user.
        username: String,
    },
    /// Delete a post with its comments.
    DeletePost {
        /// ID of the post.
        id: i32,
    },
}

#[derive(Debug, Args, Default, Clone, PartialEq, Eq)]
pub struct ServeArgs {
    /// Override the listener host.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Override the listener port.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Skip running migrations on startup.
    #[arg(long)]
    pub no_migrate: bool,
}

#[derive(Debug, Args, Clone, PartialEq, Eq)]
pub struct CreateGroupArgs {
    /// Display title.
    #[arg(long)]
    pub title: String,

    /// URL slug: letters, digits, `-` and `_`.
    #[arg(long)]
    pub slug: String,

    /// Free-form description.
    #[arg(long, default_value = "")]
    pub description: String,
}
