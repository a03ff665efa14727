use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "grosh")]
#[command(author, version, about = "Telegram bot with coin rewards: daily check-ins, referrals, raffles and a shop", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot
    Run,

    /// Deactivate ended raffles once and exit
    SweepRaffles,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
