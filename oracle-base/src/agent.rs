use std::fmt::Debug;

use async_trait::async_trait;
use eyre::Result;
use tracing::info;

use crate::settings::{LoadableFromSettings, Settings};

/// A fundamental agent which does not make any assumptions about the tools
/// which are used.
#[async_trait]
pub trait BaseAgent: Send + Sync + Debug {
    /// The agent's name
    const AGENT_NAME: &'static str;

    /// The settings object for this agent
    type Settings: LoadableFromSettings;

    /// Instantiate the agent from the standard settings object
    async fn from_settings(settings: Self::Settings) -> Result<Self>
    where
        Self: Sized;

    /// Start running this agent.
    #[allow(clippy::async_yields_async)]
    async fn run(self);
}

/// Call this from `main` to fully initialize and run the agent for its entire
/// lifecycle. This assumes only a single agent is being run. This will
/// initialize tracing as well.
pub async fn agent_main<A: BaseAgent>() -> Result<()> {
    #[cfg(feature = "color_eyre")]
    color_eyre::install()?;

    let settings = A::Settings::load()?;
    let core_settings: &Settings = settings.as_ref();
    core_settings.tracing.start_tracing()?;
    core_settings.validate()?;

    let agent = A::from_settings(settings).await?;

    agent.run().await;
    info!(agent = A::AGENT_NAME, "Shutting down agent...");
    Ok(())
}
