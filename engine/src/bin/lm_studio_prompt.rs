use std::{
    io::{Write, stdout},
    path::PathBuf,
};

use clap::Parser;
use color_eyre::Result;
use lm_studio_engine::{
    ClientConfig, LLMBox, LmStudioComponent,
    config::{self, load_config_from},
    llm::ResponseFragment,
};
use log::{info, warn};
use tokio::pin;
use tokio_stream::StreamExt;

/// Send one prompt to a local LM Studio server and print the answer
#[derive(clap::Parser)]
pub struct Cli {
    /// Config file, defaults to the one in the user's config dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    url: Option<String>,

    #[arg(short, long)]
    model: Option<String>,

    #[arg(long)]
    max_tokens: Option<usize>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    system: Option<String>,

    #[arg(short, long)]
    user: Option<String>,

    /// Print the answer while it arrives
    #[arg(long)]
    stream: bool,

    /// Write the effective config back to the config file
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut ClientConfig) {
        if let Some(url) = &self.url {
            cfg.url = url.clone();
        }
        if let Some(model) = &self.model {
            cfg.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            cfg.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            cfg.temperature = temperature;
        }
        if let Some(system) = &self.system {
            cfg.system_prompt = system.clone();
        }
        if let Some(user) = &self.user {
            cfg.user_prompt = user.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    pretty_env_logger::init();
    color_eyre::install()?;

    let mut cfg = match &args.config {
        Some(path) => load_config_from(path)?,
        None => config::load_config()?,
    }
    .unwrap_or_default();
    args.apply(&mut cfg);

    if args.save_config {
        match &args.config {
            Some(path) => config::save_ron_file(path, &cfg)?,
            None => config::save_config(&cfg)?,
        }
        info!("saved config");
    }

    let mut component = LmStudioComponent::try_new(cfg)?;

    if !args.stream {
        let output = component.send_request().await?;
        println!("{output}");
        return Ok(());
    }

    let mut llm: LLMBox = Box::new(component.client().clone());
    let stream = llm.send_request_stream(component.config().request());

    pin!(stream);
    while let Some(fragment) = stream.try_next().await? {
        match fragment {
            ResponseFragment::TextDelta(t) => {
                print!("{t}");
                stdout().flush()?;
            }
            ResponseFragment::MessageComplete(output_message) => {
                println!();
                if output_message.failures > 0 {
                    warn!("{} frame(s) could not be parsed", output_message.failures);
                }
                info!("received {} fragments", output_message.fragments);
            }
        }
    }
    Ok(())
}
