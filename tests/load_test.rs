//! Load testing for the gateway.

use std::time::{Duration, Instant};

use integration_gateway::lifecycle::Shutdown;

mod common;

#[tokio::test]
async fn test_load_performance() {
    let practice = common::start_mock_backend("[{\"slot\":\"09:00\"}]").await;
    let other = common::unused_addr().await;

    let shutdown = Shutdown::new();
    let gateway = common::start_gateway(common::gateway_config(practice, other, other), &shutdown).await;

    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let url = format!("http://{}/appointments/{}", gateway, task);
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    let breakers: serde_json::Value = client
        .get(format!("http://{}/admin/breakers", gateway))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(breakers
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["state"] == "closed" && b["consecutive_failures"] == 0));

    shutdown.trigger();
}
