//! Send an image file to a running ocrd server.
//!
//! ```text
//! cargo run -p ocrd-server --example api_client -- scan.png
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const SERVER_URL: &str = "http://localhost:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: api_client <image.png|jpg|gif>"))?;

    let mime = match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "png",
        Some("jpg") | Some("jpeg") => "jpeg",
        Some("gif") => "gif",
        other => anyhow::bail!("unsupported extension: {other:?}"),
    };
    let bytes = std::fs::read(&path)?;
    let image = format!("data:image/{mime};base64,{}", STANDARD.encode(bytes));

    let client = Client::new();

    // Example 1: Wait for the engine to finish loading
    println!("1. Readiness:");
    loop {
        let resp = client.get(format!("{SERVER_URL}/ready")).send().await?;
        let status = resp.status();
        println!("Status: {status}");
        if status.is_success() {
            break;
        }
        println!("Body: {}", resp.text().await?);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    println!();

    // Example 2: Recognize text
    println!("2. OCR:");
    let resp = client
        .post(format!("{SERVER_URL}/ocr"))
        .json(&json!({ "image": image }))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 3: Invalid input
    println!("3. Invalid Image:");
    let resp = client
        .post(format!("{SERVER_URL}/ocr"))
        .json(&json!({ "image": "hello" }))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);

    Ok(())
}
