use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use futures_util::StreamExt;

#[derive(Parser)]
#[command(name = "summary-cli")]
#[command(about = "Stream a summary from a running summary-relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    server: String,

    /// Article URL to summarize.
    url: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/summary", cli.server.trim_end_matches('/')))
        .query(&[("url", cli.url.as_str())])
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(ExitCode::FAILURE);
    }

    let mut stdout = std::io::stdout().lock();
    let mut body = res.bytes_stream();
    while let Some(chunk) = body.next().await {
        stdout.write_all(&chunk?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    Ok(ExitCode::SUCCESS)
}
