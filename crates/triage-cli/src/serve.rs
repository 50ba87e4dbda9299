//! Newline-delimited JSON request loop.
//!
//! One request object per input line, tagged by `op`; one response object per
//! output line, in the same order. Failures become `{"error": "..."}` and do
//! not stop the loop.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use triage_engine::{
    DuplicateRequest, EngineError, FeedbackRequest, PredictRequest, TriageService,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request {
    Predict(PredictRequest),
    CheckDuplicate(DuplicateRequest),
    SubmitFeedback(FeedbackRequest),
    TriggerRetrain,
    Status,
}

/// Serve until `input` reaches EOF.
pub async fn run<R, W>(service: &TriageService, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("serving newline-delimited JSON on stdin");
    let mut lines = BufReader::new(input).lines();
    let mut handled = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = handle(service, line);
        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        output.write_all(&encoded).await?;
        output.flush().await?;
        handled += 1;
    }

    info!(handled, "input closed; stopping");
    Ok(())
}

fn handle(service: &TriageService, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return json!({ "error": format!("bad request: {e}") }),
    };
    debug!(?request, "request");

    match request {
        Request::Predict(req) => reply(service.predict(&req)),
        Request::CheckDuplicate(req) => reply(service.check_duplicate(&req)),
        Request::SubmitFeedback(req) => reply(service.submit_feedback(&req)),
        Request::TriggerRetrain => reply(service.trigger_retrain()),
        Request::Status => reply(Ok::<_, EngineError>(service.manager().status())),
    }
}

fn reply<T: Serialize>(result: Result<T, EngineError>) -> Value {
    match result.map(|v| serde_json::to_value(v)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => json!({ "error": format!("encoding response: {e}") }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use triage_ai::{CentroidTrainer, HashEmbedder};
    use triage_engine::{EngineConfig, ModelManager};

    async fn service(dir: &TempDir) -> TriageService {
        let config = EngineConfig {
            retrain_interval_secs: 0,
            ..EngineConfig::with_data_dir(dir.path())
        };
        let manager = ModelManager::launch(config, Arc::new(CentroidTrainer))
            .await
            .unwrap();
        TriageService::new(manager, Arc::new(HashEmbedder::default()))
    }

    async fn exchange(service: &TriageService, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        run(service, input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_line_in_order() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;
        let input = concat!(
            r#"{"op": "predict", "text": "minor pothole but unconscious victim"}"#,
            "\n\n",
            r#"{"op": "check_duplicate", "new_complaint": "pothole", "existing_complaints": []}"#,
            "\n",
            r#"{"op": "submit_feedback", "text": "cows on flyover", "correct_category": "Animal Control & Veterinary"}"#,
            "\n",
            r#"{"op": "status"}"#,
            "\n",
        );

        let replies = exchange(&svc, input).await;
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0]["priority_score"], 100);
        assert_eq!(replies[0]["priority_level"], "Critical");
        assert_eq!(replies[1]["is_duplicate"], false);
        assert_eq!(replies[1]["score"], 0.0);
        assert_eq!(replies[2]["status"], "recorded");
        assert_eq!(replies[3]["generation"], 1);
    }

    #[tokio::test]
    async fn errors_do_not_stop_the_loop() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;
        let input = "not json\n{\"op\": \"predict\", \"text\": \"\"}\n{\"op\": \"trigger_retrain\"}\n";

        let replies = exchange(&svc, input).await;
        assert_eq!(replies.len(), 3);
        assert!(replies[0]["error"].as_str().unwrap().starts_with("bad request"));
        assert!(replies[1]["error"].as_str().unwrap().contains("must not be empty"));
        assert!(replies[2]["status"].is_string());
    }
}
