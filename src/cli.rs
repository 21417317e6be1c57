use clap::{ArgAction, Parser};

/// Journals queued subscription intents and reconciles them with Mailchimp.
#[derive(Debug, Parser)]
#[command(name = "mailsling")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Drain the message queue into the journal.
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub poll: bool,

    /// Push pending list recipients to Mailchimp.
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub process: bool,
}
