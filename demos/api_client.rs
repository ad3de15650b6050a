/// Example HTTP client demonstrating how to call the Decaptcher HTTP server API
///
/// Run the server first:
/// ```bash
/// DECAPTCHER_USERNAME=... DECAPTCHER_PASSWORD=... cargo run --bin server
/// ```
///
/// Then run this example:
/// ```bash
/// cargo run --example api_client
/// ```

use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct SolveImageRequest {
    image_b64: String,
}

#[derive(Serialize)]
struct RefundRequest {
    pic_id: String,
}

#[derive(Deserialize, Debug)]
struct SolveResponse {
    success: bool,
    pic_id: String,
    text: String,
    elapsed_ms: u64,
}

#[derive(Deserialize, Debug)]
struct RawResponse {
    success: bool,
    response: String,
}

#[derive(Deserialize, Debug)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize, Debug)]
struct MetricsResponse {
    total_requests: u64,
    requests_in_flight: u64,
    uptime_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = reqwest::Client::new();

    println!("=== Decaptcher HTTP API Client Demo ===\n");

    // 1. Health Check
    println!("1. Checking server health...");
    let health_url = format!("{}/health", base_url);
    let health: HealthResponse = client.get(&health_url).send().await?.json().await?;
    println!("   Server status: {}", health.status);
    println!("   Version: {}\n", health.version);

    // 2. Solve an image
    println!("2. Solving a captcha image...");
    let solve_url = format!("{}/api/solve", base_url);
    let image = std::env::args()
        .nth(1)
        .map(std::fs::read)
        .transpose()?
        .unwrap_or_else(|| b"not a real image".to_vec());
    let request = SolveImageRequest {
        image_b64: base64::engine::general_purpose::STANDARD.encode(&image),
    };

    let mut solved_pic_id = None;
    match client.post(&solve_url).json(&request).send().await {
        Ok(response) => {
            if response.status().is_success() {
                let result: SolveResponse = response.json().await?;
                println!("   Text: {}", result.text);
                println!("   Pic id: {}", result.pic_id);
                println!("   Elapsed: {} ms\n", result.elapsed_ms);
                solved_pic_id = Some(result.pic_id);
            } else {
                let error_text = response.text().await?;
                println!("   Error: {}\n", error_text);
            }
        }
        Err(e) => {
            println!("   Request failed: {}\n", e);
        }
    }

    // 3. Request a refund for a bad solve
    if let Some(pic_id) = solved_pic_id {
        println!("3. Requesting refund for {}...", pic_id);
        let refund_url = format!("{}/api/refund", base_url);
        match client
            .post(&refund_url)
            .json(&RefundRequest { pic_id })
            .send()
            .await
        {
            Ok(response) => {
                if response.status().is_success() {
                    let result: RawResponse = response.json().await?;
                    println!("   Service said: {}\n", result.response);
                } else {
                    let error_text = response.text().await?;
                    println!("   Error: {}\n", error_text);
                }
            }
            Err(e) => {
                println!("   Request failed: {}\n", e);
            }
        }
    } else {
        println!("3. Skipping refund (no solve to refund)\n");
    }

    // 4. Check balance
    println!("4. Checking account balance...");
    let balance_url = format!("{}/api/balance", base_url);
    match client.get(&balance_url).send().await {
        Ok(response) => {
            if response.status().is_success() {
                let result: RawResponse = response.json().await?;
                println!("   Balance: {}\n", result.response);
            } else {
                let error_text = response.text().await?;
                println!("   Error: {}\n", error_text);
            }
        }
        Err(e) => {
            println!("   Request failed: {}\n", e);
        }
    }

    // 5. Get Metrics
    println!("5. Getting server metrics...");
    let metrics_url = format!("{}/api/metrics", base_url);
    let metrics: MetricsResponse = client.get(&metrics_url).send().await?.json().await?;
    println!("   Total requests: {}", metrics.total_requests);
    println!("   Requests in flight: {}", metrics.requests_in_flight);
    println!("   Uptime: {} seconds\n", metrics.uptime_seconds);

    println!("=== Demo Complete ===");

    Ok(())
}
