use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::de::DeserializeOwned;

use video_gen_proxy::api::schema::{
    GenerateVideoRequest, GenerateVideoResponse, HealthResponse, VideoStatusResponse,
};
use video_gen_proxy::task::{CustomizationOptions, TaskStatus};
use video_gen_proxy::Config;

#[derive(Parser, Debug)]
#[command(name = "videoctl", about = "CLI for the video generation proxy", version)]
struct Cli {
    /// Base URL of a running proxy
    #[arg(global = true, long, env = "API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a new generation request
    Submit {
        /// Idea to turn into a video
        prompt: String,
        /// Clip length in seconds (3-10)
        #[arg(long)]
        duration: Option<i64>,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        camera: Option<String>,
        #[arg(long)]
        lighting: Option<String>,
        #[arg(long)]
        mood: Option<String>,
        /// Things the video should avoid
        #[arg(long, value_name = "TEXT")]
        negative_prompt: Option<String>,
        /// Send the prompt to the provider unchanged
        #[arg(long)]
        no_enhance: bool,
        /// Block until the task finishes
        #[arg(long)]
        wait: bool,
    },
    /// Show the status of a task
    Status {
        task_id: String,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll a task until it completes or fails
    Wait {
        task_id: String,
        /// Seconds between polls
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
    /// Query the service health endpoint
    Health {
        /// Also contact the generation provider
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    Config::dotenv_load();
    let cli = Cli::parse();
    let api = cli.api_url.trim_end_matches('/').to_string();
    let client = Client::new();

    match cli.command {
        Commands::Submit {
            prompt, duration,
            style, camera, lighting, mood,
            negative_prompt, no_enhance, wait,
        } => {
            let options = CustomizationOptions { style, camera, lighting, mood, ..Default::default() };
            let request = GenerateVideoRequest {
                prompt,
                duration,
                customization_options: (!options.is_empty()).then_some(options),
                negative_prompt,
                enhance_prompt: Some(!no_enhance),
            };
            let response = client
                .post(format!("{}/api/generate-video", api))
                .json(&request)
                .send()
                .await?;
            let queued: GenerateVideoResponse = read_json(response).await?;
            println!("{} {}", queued.task_id, queued.status);
            if wait {
                wait_for(&client, &api, &queued.task_id, Duration::from_secs(2)).await?;
            }
            Ok(())
        }
        Commands::Status { task_id, json } => {
            let status = fetch_status(&client, &api, &task_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
            Ok(())
        }
        Commands::Wait { task_id, interval } => {
            wait_for(&client, &api, &task_id, Duration::from_secs(interval.max(1))).await
        }
        Commands::Health { check } => {
            let response = client
                .get(format!("{}/health", api))
                .query(&[("check", check)])
                .send()
                .await?;
            let health: HealthResponse = read_json(response).await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(())
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Box<dyn std::error::Error>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("request failed ({}): {}", status, body).into());
    }
    Ok(response.json::<T>().await?)
}

async fn fetch_status(client: &Client, api: &str, task_id: &str) -> Result<VideoStatusResponse, Box<dyn std::error::Error>> {
    let response = client.get(format!("{}/api/video-status/{}", api, task_id)).send().await?;
    read_json(response).await
}

fn print_status(status: &VideoStatusResponse) {
    println!("{} {:>3}% {}: {}", status.task_id, status.progress, status.status, status.message);
    if let Some(prompt) = &status.enhanced_prompt {
        println!("  prompt: {}", prompt);
    }
    if let Some(url) = &status.video_url {
        println!("  video:  {}", url);
    }
    if let Some(error) = &status.error {
        println!("  error:  {}", error);
    }
}

async fn wait_for(client: &Client, api: &str, task_id: &str, interval: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let mut last = None;
    loop {
        let status = fetch_status(client, api, task_id).await?;
        let seen = (status.status, status.progress);
        if last != Some(seen) {
            print_status(&status);
            last = Some(seen);
        }
        if status.status.is_terminal() {
            if status.status == TaskStatus::Failed {
                std::process::exit(1);
            }
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}
