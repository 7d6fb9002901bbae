use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Re-sign a macOS application bundle, innermost code first")]
pub struct Args {
    /// Path to the application bundle (must end in .app)
    pub bundle: PathBuf,

    /// Developer ID Application identity; empty or omitted searches the keychain
    pub identity: Option<String>,

    /// FATAL, ERROR, WARNING, INFO or DEBUG
    #[arg(default_value = "INFO")]
    pub log_level: String,

    /// Settings file (TOML) with stage switches, Info.plist keys and entitlements
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Do not request a trusted timestamp
    #[arg(long)]
    pub local: bool,

    /// Deep-verify the bundle after signing
    #[arg(long)]
    pub verify: bool,
}
