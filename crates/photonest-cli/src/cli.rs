use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "photonest")]
#[command(about = "Share photos, follow people and browse your feed from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a JSON config file (defaults to the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend override: firebase or memory
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Path to the local cache database
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,

    /// Output listings as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum BackendArg {
    Firebase,
    Memory,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign up, sign in and manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Posts from people you follow
    Feed {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Create and interact with posts
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },
    /// Trending posts and categories
    Explore {
        #[command(subcommand)]
        command: ExploreCommands,
    },
    /// Profiles and the follow graph
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Activity on your account
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },
    /// Walk through the main flows against the in-memory backend
    Demo,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        full_name: String,
        /// Code from `auth otp-send`, needed when an OTP service is configured
        #[arg(long)]
        code: Option<String>,
    },
    /// Sign in and store the session in the OS keychain
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Sign out and clear the local cache
    Logout,
    /// Show who is signed in
    Status,
    /// Email a password reset link
    ResetPassword {
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Email a one-time code
    OtpSend {
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Check a one-time code
    OtpVerify {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long)]
        code: String,
    },
}

#[derive(Subcommand)]
pub enum PostCommands {
    /// Upload an image with a caption
    Create {
        /// Image file to upload
        #[arg(value_name = "PATH")]
        image: PathBuf,
        #[arg(short, long, default_value = "")]
        caption: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Show a post with its comments
    Show { id: String },
    /// Delete one of your posts
    Delete { id: String },
    /// Like or unlike a post
    Like { id: String },
    /// Bookmark or un-bookmark a post
    Bookmark { id: String },
    /// Comment on a post
    Comment {
        id: String,
        text: Vec<String>,
        /// Reply to this comment
        #[arg(long, value_name = "COMMENT_ID")]
        reply_to: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExploreCommands {
    /// Most liked posts
    Trending {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Most used categories
    Categories {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Posts in one category
    Category {
        name: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Show a profile by username (yours when omitted)
    Show { username: Option<String> },
    /// Find users by username prefix
    Search {
        prefix: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    Follow { username: String },
    Unfollow { username: String },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// Recent notifications and pending follow requests
    List,
    /// Mark every notification as read
    ReadAll,
}
