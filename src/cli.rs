use clap::Parser;

use crate::model::Scope;

#[derive(Parser, Debug)]
#[command(name = "azct", version, about = "Terminal dashboard for Azure resources")]
pub struct Args {
    /// Subscription ID to open at startup
    #[arg(short, long)]
    pub subscription: Option<String>,

    /// Resource group to open at startup
    #[arg(short = 'g', long, requires = "subscription")]
    pub resource_group: Option<String>,

    /// Cache TTL in seconds, overriding the config file
    #[arg(long, value_name = "SECONDS")]
    pub ttl: Option<u64>,
}

impl Args {
    /// Scope given on the command line, if any.
    pub fn scope(&self) -> Option<Scope> {
        let subscription = self.subscription.clone()?;
        Some(match &self.resource_group {
            Some(group) => Scope::resource_group(subscription, group.clone()),
            None => Scope::subscription(subscription),
        })
    }
}
