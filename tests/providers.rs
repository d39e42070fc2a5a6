//! Provider integration tests against mocked HTTP backends.

mod ltx_tests {
    use futures::TryStreamExt;
    use reqwest::Client;
    use serde_json::json;
    use video_gen_proxy::artifact::ArtifactSource;
    use video_gen_proxy::provider::{
        generate, GenerationDefaults, JobRef, LtxProvider, PollPolicy, Submission, VideoProvider,
    };
    use video_gen_proxy::AppError;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn submit_sends_frame_shape_and_returns_filename() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(json!({
                "prompt": "a cat on a skateboard",
                "num_frames": 150,
                "num_inference_steps": 50,
                "width": 704,
                "height": 480,
                "negative_prompt": "",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "ok",
                "video_filename": "clip_1.mp4",
                "generation_time": 12.5,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = LtxProvider::new(server.uri(), Client::new());
        let shape = GenerationDefaults::default().shape_for(5, None);
        let submission = provider.submit("a cat on a skateboard", &shape).await.unwrap();
        assert_eq!(submission, Submission::Ready(JobRef("clip_1.mp4".to_string())));
    }

    #[tokio::test]
    async fn http_error_mentions_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
            .mount(&server)
            .await;

        let provider = LtxProvider::new(server.uri(), Client::new());
        let shape = GenerationDefaults::default().shape_for(5, None);
        let err = provider.submit("p", &shape).await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
        let text = err.to_string();
        assert!(text.contains("500"), "unexpected error: {}", text);
        assert!(text.contains("CUDA out of memory"));
    }

    #[tokio::test]
    async fn unsuccessful_body_is_a_job_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "prompt rejected",
            })))
            .mount(&server)
            .await;

        let provider = LtxProvider::new(server.uri(), Client::new());
        let shape = GenerationDefaults::default().shape_for(3, None);
        let err = provider.submit("p", &shape).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderJobFailed(ref m) if m == "prompt rejected"));
    }

    #[tokio::test]
    async fn generate_streams_rendered_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "video_filename": "clip_2.mp4",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/video/clip_2.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4-bytes".to_vec()))
            .mount(&server)
            .await;

        let provider = LtxProvider::new(server.uri(), Client::new());
        let shape = GenerationDefaults::default().shape_for(5, None);
        let output = generate(&provider, "p", &shape, PollPolicy::default(), |_| {}).await.unwrap();
        let stream = match output {
            ArtifactSource::Stream(stream) => stream,
            other => panic!("expected a streamed result, got {:?}", other),
        };
        let chunks: Vec<_> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"mp4-bytes".to_vec());
    }

    #[tokio::test]
    async fn health_check_reports_unreachable_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = LtxProvider::new(server.uri(), Client::new());
        assert!(provider.check_health().await.is_err());
    }
}

mod runway_tests {
    use std::time::Duration;

    use reqwest::Client;
    use serde_json::json;
    use video_gen_proxy::artifact::ArtifactSource;
    use video_gen_proxy::provider::{generate, GenerationDefaults, PollPolicy, RunwayProvider};
    use video_gen_proxy::AppError;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> PollPolicy {
        PollPolicy { interval: Duration::from_millis(10), budget: Duration::from_secs(5) }
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/text_to_video"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("x-runway-version", "2024-11-06"))
            .and(body_partial_json(json!({
                "promptText": "ocean waves at dusk",
                "model": "gen3a_turbo",
                "duration": 5,
                "ratio": "1280:720",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "task-42" })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn polls_until_succeeded_and_returns_remote_url() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "RUNNING" })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "SUCCEEDED",
                "output": ["https://cdn.example/task-42.mp4"],
            })))
            .mount(&server)
            .await;

        let provider = RunwayProvider::new(server.uri(), "test-key", "gen3a_turbo", Client::new());
        let shape = GenerationDefaults::default().shape_for(5, None);
        let mut pending_reports = 0;
        let output = generate(&provider, "ocean waves at dusk", &shape, fast_policy(), |_| pending_reports += 1)
            .await
            .unwrap();

        assert_eq!(pending_reports, 2);
        assert!(matches!(output, ArtifactSource::RemoteUrl(ref u) if u == "https://cdn.example/task-42.mp4"));
    }

    #[tokio::test]
    async fn failed_task_carries_failure_message() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "FAILED",
                "failure": { "message": "content moderation" },
            })))
            .mount(&server)
            .await;

        let provider = RunwayProvider::new(server.uri(), "test-key", "gen3a_turbo", Client::new());
        let shape = GenerationDefaults::default().shape_for(5, None);
        let err = generate(&provider, "ocean waves at dusk", &shape, fast_policy(), |_| {}).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderJobFailed(ref m) if m == "content moderation"));
    }

    #[tokio::test]
    async fn stuck_task_times_out() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "PENDING" })))
            .mount(&server)
            .await;

        let provider = RunwayProvider::new(server.uri(), "test-key", "gen3a_turbo", Client::new());
        let shape = GenerationDefaults::default().shape_for(5, None);
        let policy = PollPolicy { interval: Duration::from_millis(10), budget: Duration::from_millis(50) };
        let err = generate(&provider, "ocean waves at dusk", &shape, policy, |_| {}).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderTimeout { .. }));
    }
}

mod huggingface_tests {
    use reqwest::Client;
    use serde_json::json;
    use video_gen_proxy::artifact::ArtifactSource;
    use video_gen_proxy::provider::{
        generate, GenerationDefaults, HuggingFaceProvider, PollPolicy, Submission, VideoProvider,
    };
    use video_gen_proxy::AppError;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "Wan-AI/Wan2.2-TI2V-5B";

    fn provider(server: &MockServer) -> HuggingFaceProvider {
        HuggingFaceProvider::new(server.uri(), "hf_test", MODEL, Client::new())
    }

    #[tokio::test]
    async fn video_body_becomes_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/Wan-AI/Wan2.2-TI2V-5B"))
            .and(header("authorization", "Bearer hf_test"))
            .and(body_partial_json(json!({
                "inputs": "waves at dusk",
                "parameters": {"num_frames": 150, "negative_prompt": "blurry"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"\x00\x00\x00\x18ftypmp42".to_vec(), "video/mp4"))
            .expect(1)
            .mount(&server)
            .await;

        let shape = GenerationDefaults::default().shape_for(5, Some("blurry"));
        let output = generate(&provider(&server), "waves at dusk", &shape, PollPolicy::default(), |_| {})
            .await
            .unwrap();
        match output {
            ArtifactSource::RawBytes(bytes) => assert_eq!(&bytes[4..8], b"ftyp"),
            other => panic!("expected raw bytes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn json_url_becomes_remote_result_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/Wan-AI/Wan2.2-TI2V-5B"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn.example/hf.mp4"})))
            .mount(&server)
            .await;

        let hf = provider(&server);
        let shape = GenerationDefaults::default().shape_for(5, None);
        let job = match hf.submit("p", &shape).await.unwrap() {
            Submission::Ready(job) => job,
            other => panic!("expected a ready job, got {:?}", other),
        };
        assert!(matches!(
            hf.fetch_result(&job).await.unwrap(),
            ArtifactSource::RemoteUrl(url) if url == "https://cdn.example/hf.mp4"
        ));
        // The held output is handed out once.
        assert!(hf.fetch_result(&job).await.is_err());
    }

    #[tokio::test]
    async fn inference_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/Wan-AI/Wan2.2-TI2V-5B"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "Model is currently loading"})))
            .mount(&server)
            .await;

        let shape = GenerationDefaults::default().shape_for(5, None);
        let err = provider(&server).submit("p", &shape).await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
        let text = err.to_string();
        assert!(text.contains("503"), "unexpected error: {}", text);
        assert!(text.contains("currently loading"));
    }
}
