use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(name = "mock-cli")]
#[command(about = "Client for a running live-mock server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a message (the server must have mutation enabled)
    Put {
        path: String,
        message: String,
        #[arg(short, long)]
        status: Option<u16>,
        /// Send the update with POST instead of PUT
        #[arg(long)]
        post: bool,
    },
    /// Fetch the message served for a path
    Get { path: String },
    /// Send a CORS preflight and print the returned headers
    Preflight { path: String },
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Put {
            path,
            message,
            status,
            post,
        } => {
            let mut body = json!({ "message": message });
            if let Some(status) = status {
                body["status"] = json!(status);
            }
            let url = endpoint(&cli.url, &path);
            let request = if post { client.post(url) } else { client.put(url) };
            let res = request.json(&body).send().await?;
            print_response(res).await?;
        }
        Commands::Get { path } => {
            let res = client.get(endpoint(&cli.url, &path)).send().await?;
            print_response(res).await?;
        }
        Commands::Preflight { path } => {
            let res = client
                .request(reqwest::Method::OPTIONS, endpoint(&cli.url, &path))
                .send()
                .await?;
            println!("{}", res.status());
            for (name, value) in res.headers() {
                println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        eprintln!("Response: {}", text.trim_end());
        return Ok(());
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
