//! 整条流水线：上传 → 识别 → 匹配 → 评分 → 总结

use std::sync::Arc;

use quiz_grader::clients::MockModelClient;
use quiz_grader::infrastructure::{get_as, query_as, MemoryBlobStore, Query};
use quiz_grader::models::paths::{quiz_doc_path, quiz_response_doc_path, quiz_responses_col_path};
use quiz_grader::services::prompts::{
    QUIZ_GRADE_SCHEMA_NAME, QUIZ_RESPONSE_SCHEMA_NAME, STUDENT_MATCH_SCHEMA_NAME,
};
use quiz_grader::services::PARSE_FAILURE_MESSAGE;
use quiz_grader::{App, Command, Config, MemoryStore, Quiz, QuizResponse};
use serde_json::json;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const SEED: &str = r#"
[[students]]
id = "s1"
name = "Ada Lovelace"

[[students]]
id = "s2"
name = "Grace Hopper"

[[quizzes]]
id = "quiz1"
name = "Arithmetic"

[[quizzes.questions]]
id = "q1"
question = "2 + 2 = ?"
answer = "4"
points = 10
"#;

struct Harness {
    dir: TempDir,
    app: App,
    mock: Arc<MockModelClient>,
    blobs: Arc<MemoryBlobStore>,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("data"),
            blob_public_base_url: "https://blobs.test".to_string(),
            ..Default::default()
        };
        let mock = Arc::new(MockModelClient::new());
        let blobs = Arc::new(MemoryBlobStore::new("https://blobs.test"));
        let mut app = App::with_components(
            config,
            Arc::new(MemoryStore::new()),
            blobs.clone(),
            mock.clone(),
        );

        let seed_path = dir.path().join("seed.toml");
        std::fs::write(&seed_path, SEED).unwrap();
        assert_ok!(app.execute(Command::Seed { path: seed_path }).await);

        Self {
            dir,
            app,
            mock,
            blobs,
        }
    }

    async fn upload(&mut self) -> String {
        let photo = self.dir.path().join("photo.png");
        std::fs::write(&photo, b"fake png bytes").unwrap();
        assert_ok!(
            self.app
                .execute(Command::Upload {
                    quiz_id: "quiz1".into(),
                    photo,
                })
                .await
        );

        let responses: Vec<QuizResponse> = query_as(
            self.app.store().as_ref(),
            &quiz_responses_col_path("quiz1"),
            &Query::new(),
        )
        .await
        .unwrap();
        responses
            .into_iter()
            .max_by_key(|r| r.create_date)
            .map(|r| r.id)
            .unwrap()
    }

    async fn response(&self, response_id: &str) -> QuizResponse {
        get_as(
            self.app.store().as_ref(),
            &quiz_response_doc_path("quiz1", response_id),
        )
        .await
        .unwrap()
        .unwrap()
    }

    async fn quiz(&self) -> Quiz {
        get_as(self.app.store().as_ref(), &quiz_doc_path("quiz1"))
            .await
            .unwrap()
            .unwrap()
    }

    fn reply_parse(&self, value: serde_json::Value) {
        self.mock.reply_structured(QUIZ_RESPONSE_SCHEMA_NAME, value);
    }

    fn reply_match(&self, student_id: &str, confidence: f64) {
        self.mock.reply_structured(
            STUDENT_MATCH_SCHEMA_NAME,
            json!({"studentId": student_id, "confidence": confidence}),
        );
    }

    fn reply_grade(&self, earned: u32) {
        self.mock.reply_structured(
            QUIZ_GRADE_SCHEMA_NAME,
            json!({
                "questionGrades": [{
                    "questionId": "q1",
                    "studentAnswer": "4",
                    "pointsEarned": earned,
                    "maxPoints": 10,
                    "explanation": "Checked against the key"
                }],
                "totalPointsEarned": earned,
                "totalPossiblePoints": 10,
                "summary": "Knows basic addition."
            }),
        );
    }
}

#[tokio::test]
async fn upload_runs_the_whole_chain() {
    let mut h = Harness::new().await;
    h.reply_parse(json!({"studentName": "Ada L.", "answers": {"q1": "4"}}));
    h.reply_match("s1", 0.95);
    h.reply_grade(10);
    h.mock.reply_text("The class understands addition.");

    let response_id = h.upload().await;
    let response = h.response(&response_id).await;

    let photo_path = response.photo_capture_path.clone().unwrap();
    assert!(h.blobs.contains(&photo_path));
    assert_eq!(
        h.mock.requests_for(QUIZ_RESPONSE_SCHEMA_NAME)[0].image_urls(),
        vec![format!("https://blobs.test/{}", photo_path).as_str()]
    );

    let info = response.photo_capture_parsed_info.clone().unwrap();
    assert_eq!(info.student_name.as_deref(), Some("Ada L."));
    assert!(response.photo_capture_parse_end_date.is_some());
    assert_eq!(response.photo_capture_parsed_student_id.as_deref(), Some("s1"));
    assert_eq!(response.student_id.as_deref(), Some("s1"));

    let grade = response.auto_grade_results.clone().unwrap();
    assert_eq!(grade.question_grades.len(), 1);
    assert_eq!(grade.question_grades[0].points_earned, 10.0);
    assert!(response.auto_grade_run_end_date.is_some());

    let quiz = h.quiz().await;
    assert_eq!(quiz.average_score, Some(1.0));
    assert_eq!(quiz.summary.as_deref(), Some("The class understands addition."));
    assert!(h.mock.requests_for("text")[0]
        .text()
        .contains("Ada Lovelace:\n- Total Score: 10/10"));

    // 每个阶段只调用一次模型
    assert_eq!(h.mock.request_count(), 4);
}

#[tokio::test]
async fn low_confidence_match_waits_for_manual_assignment() {
    let mut h = Harness::new().await;
    h.reply_parse(json!({"studentName": "G. H.", "answers": {"q1": "5"}}));
    h.reply_match("s2", 0.8);
    h.reply_grade(0);

    let response_id = h.upload().await;
    let response = h.response(&response_id).await;
    assert_eq!(response.photo_capture_parsed_student_id, None);
    assert_eq!(response.student_id, None);
    assert!(response.auto_grade_results.is_some());
    assert!(h.quiz().await.summary_should_run_date.is_none());
    assert!(h.mock.requests_for("text").is_empty());

    h.mock.reply_text("Addition needs review.");
    assert_ok!(
        h.app
            .execute(Command::Assign {
                quiz_id: "quiz1".into(),
                response_id: response_id.clone(),
                student_id: Some("s2".into()),
            })
            .await
    );

    let response = h.response(&response_id).await;
    assert_eq!(response.student_id.as_deref(), Some("s2"));
    let quiz = h.quiz().await;
    assert_eq!(quiz.average_score, Some(0.0));
    assert_eq!(quiz.summary.as_deref(), Some("Addition needs review."));
}

#[tokio::test]
async fn regrade_restamps_the_summary_request() {
    let mut h = Harness::new().await;
    h.reply_parse(json!({"studentName": "Ada", "answers": {"q1": "4"}}));
    h.reply_match("s1", 0.99);
    h.reply_grade(7);
    h.mock.reply_text("First pass.");
    let response_id = h.upload().await;
    let first_request = h.quiz().await.summary_should_run_date.unwrap();

    h.reply_grade(10);
    h.mock.reply_text("Second pass.");
    assert_ok!(
        h.app
            .execute(Command::Regrade {
                quiz_id: "quiz1".into(),
                response_id: response_id.clone(),
            })
            .await
    );

    let quiz = h.quiz().await;
    assert!(quiz.summary_should_run_date.unwrap() > first_request);
    assert_eq!(quiz.summary.as_deref(), Some("Second pass."));
    let grade = h.response(&response_id).await.auto_grade_results.unwrap();
    assert_eq!(grade.total_points_earned, 10.0);
}

#[tokio::test]
async fn not_student_work_is_surfaced_verbatim() {
    let mut h = Harness::new().await;
    h.reply_parse(json!({"error": "The image shows a cat, not a quiz."}));

    let response_id = h.upload().await;
    let response = h.response(&response_id).await;
    assert_eq!(
        response.photo_capture_parse_error.as_deref(),
        Some("The image shows a cat, not a quiz.")
    );
    assert!(response.photo_capture_parsed_info.is_none());
    assert!(response.auto_grade_results.is_none());
    assert_eq!(h.mock.request_count(), 1);
}

#[tokio::test]
async fn model_failure_still_ends_the_stage_and_reparse_recovers() {
    let mut h = Harness::new().await;
    h.mock.reply_error(QUIZ_RESPONSE_SCHEMA_NAME, "503 Service Unavailable");

    let response_id = h.upload().await;
    let response = h.response(&response_id).await;
    assert_eq!(
        response.photo_capture_parse_error.as_deref(),
        Some(PARSE_FAILURE_MESSAGE)
    );
    assert!(response.photo_capture_parse_end_date.is_some());

    h.reply_parse(json!({"studentName": "Ada", "answers": {}}));
    h.reply_match("s1", 0.9);
    assert_ok!(
        h.app
            .execute(Command::Reparse {
                quiz_id: "quiz1".into(),
                response_id: response_id.clone(),
            })
            .await
    );

    let response = h.response(&response_id).await;
    assert_eq!(response.photo_capture_parse_error, None);
    assert_eq!(response.student_id.as_deref(), Some("s1"));
    // 空答案：评分前直接失败，不调用模型
    assert_eq!(response.auto_grade_error.as_deref(), Some("No answers found"));
    assert!(h.mock.requests_for(QUIZ_GRADE_SCHEMA_NAME).is_empty());
}

#[tokio::test]
async fn summary_without_responses_fails_fast() {
    let mut h = Harness::new().await;
    assert_ok!(
        h.app
            .execute(Command::Resummarize {
                quiz_id: "quiz1".into(),
            })
            .await
    );

    let quiz = h.quiz().await;
    assert_eq!(
        quiz.summary.as_deref(),
        Some("The quiz does not have any responses yet.")
    );
    assert!(quiz.summary_run_end_date.is_some());
    assert_eq!(h.mock.request_count(), 0);
}

#[tokio::test]
async fn delete_removes_photo_and_document() {
    let mut h = Harness::new().await;
    h.reply_parse(json!({"error": "blurry"}));
    let response_id = h.upload().await;
    let photo_path = h.response(&response_id).await.photo_capture_path.unwrap();

    assert_ok!(
        h.app
            .execute(Command::DeleteResponse {
                quiz_id: "quiz1".into(),
                response_id: response_id.clone(),
            })
            .await
    );
    assert!(!h.blobs.contains(&photo_path));
    let gone: Option<QuizResponse> = get_as(
        h.app.store().as_ref(),
        &quiz_response_doc_path("quiz1", &response_id),
    )
    .await
    .unwrap();
    assert!(gone.is_none());

    assert_err!(
        h.app
            .execute(Command::DeleteResponse {
                quiz_id: "quiz1".into(),
                response_id,
            })
            .await
    );
}

#[tokio::test]
async fn report_and_snapshot() {
    let mut h = Harness::new().await;
    h.reply_parse(json!({"studentName": "Ada", "answers": {"q1": "4"}}));
    h.reply_match("s1", 0.97);
    h.reply_grade(10);
    h.mock.reply_text("All good.");
    h.upload().await;

    let report = h.app.report("quiz1").await.unwrap();
    assert!(report.contains("测验: Arithmetic (quiz1)"));
    assert!(report.contains("学生: Ada Lovelace (s1)"));
    assert!(report.contains("得分 10/10"));
    assert!(report.contains("All good."));

    assert_err!(h.app.report("missing").await);

    assert_ok!(
        h.app
            .run(Command::Show {
                quiz_id: "quiz1".into(),
            })
            .await
    );
    let snapshot = h.app.config().snapshot_path();
    let reloaded = MemoryStore::load_snapshot(&snapshot).await.unwrap();
    let quiz: Option<Quiz> = get_as(&reloaded, &quiz_doc_path("quiz1")).await.unwrap();
    assert_eq!(quiz.unwrap().summary.as_deref(), Some("All good."));
}
