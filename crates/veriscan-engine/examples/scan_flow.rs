// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simulated capture session: the barcode decoder keeps missing until the
// attempt budget runs out, the engine falls back to OCR, and OCR completes.
//
//     RUST_LOG=debug cargo run -p veriscan-engine --example scan_flow

use serde_json::json;
use tokio::time::{Duration, sleep};

use veriscan_core::config::FallbackConfig;
use veriscan_core::error::{Result, ScanError, ScanErrorCode};
use veriscan_core::types::{Pipeline, PipelineResult, ScanMode};
use veriscan_engine::{ScanEngine, ScanEvent};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = FallbackConfig {
        max_barcode_attempts: 3,
        ..FallbackConfig::default()
    };
    let engine = ScanEngine::spawn(config)?;
    let mut events = engine.subscribe();

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ScanEvent::Progress(p) => {
                    println!("[{:?}] {:>5.1}%  {}", p.state, p.progress_percentage, p.message);
                }
                ScanEvent::Terminal(report) => {
                    println!("--- session {} finished ---", report.session_id);
                    println!("metrics: {:#?}", report.metrics);
                    break;
                }
            }
        }
    });

    let session_id = engine.start(ScanMode::Auto).await?;
    println!("started session {session_id}");

    // Three barcode misses burn the attempt budget and trigger fallback.
    for _ in 0..3 {
        sleep(Duration::from_millis(400)).await;
        engine
            .submit_result(PipelineResult::failed(
                Pipeline::Barcode,
                ScanError::new(ScanErrorCode::NoBarcodeFound, "no PDF417 region located"),
            ))
            .await?;
    }

    // OCR picks the document up on its first pass.
    sleep(Duration::from_millis(600)).await;
    engine
        .submit_result(PipelineResult::ok(
            Pipeline::Ocr,
            0.91,
            json!({
                "last_name": "SAMPLE",
                "first_name": "ALEX",
                "license_number": "D123-4567-8901",
            }),
        ))
        .await?;

    let _ = printer.await;
    Ok(())
}
