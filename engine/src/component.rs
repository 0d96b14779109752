use color_eyre::Result;
use log::{info, warn};

use crate::{
    config::ClientConfig,
    llm::{LmStudio, lm_studio::Decoded},
};

/// Receives the text of a finished request
pub trait OutputHandler {
    fn handle_output(&mut self, output: &str);
}

/// Logs the output at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput;

impl OutputHandler for LogOutput {
    fn handle_output(&mut self, output: &str) {
        info!("{output}");
    }
}

impl<F: FnMut(&str)> OutputHandler for F {
    fn handle_output(&mut self, output: &str) {
        self(output)
    }
}

/// The piece a host engine owns: a validated config plus the output of the last
/// request.
pub struct LmStudioComponent {
    config: ClientConfig,
    client: LmStudio,
    output: String,
}

impl LmStudioComponent {
    pub fn try_new(config: ClientConfig) -> Result<Self> {
        let client = LmStudio::try_new(&config)?;
        Ok(Self {
            config,
            client,
            output: String::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client(&self) -> &LmStudio {
        &self.client
    }

    /// Output of the last successful request
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Startup hook. Sends the configured prompts if `run_on_start` is set and
    /// hands the result to `handler`. Returns whether a request was made.
    pub async fn start(&mut self, handler: &mut impl OutputHandler) -> Result<bool> {
        if !self.config.run_on_start {
            return Ok(false);
        }

        self.send_request().await?;
        handler.handle_output(&self.output);
        Ok(true)
    }

    /// Resets the output, then fills it with the decoded response
    pub async fn send_request(&mut self) -> Result<&str> {
        self.output.clear();

        let Decoded { text, failures } = self.client.send_request(self.config.request()).await?;
        if !failures.is_empty() {
            warn!("{} frame(s) could not be parsed", failures.len());
        }

        self.output = text;
        Ok(&self.output)
    }
}
