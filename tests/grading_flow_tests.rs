// tests/grading_flow_tests.rs

use std::{collections::HashMap, sync::Arc, time::Duration};

use assessment_backend::{
    config::Config,
    engine::scoring,
    models::{
        attempt::AttemptStatus,
        question::{Question, QuestionType},
        test::{SectionDef, TestDefinition, TestMode, TestStatus},
    },
    routes,
    services::{AssessmentService, Defaults},
    state::AppState,
    store::{AttemptStore, QuestionBank, TestCatalog, memory::MemoryStore},
    utils::jwt::{ROLE_STUDENT, ROLE_TEACHER, sign_jwt},
};
use serde_json::{Value, json};

const SECRET: &str = "grading_flow_test_secret";

struct TestApp {
    address: String,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

impl TestApp {
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        user: &str,
        role: &str,
        body: Option<Value>,
    ) -> reqwest::Response {
        let token = sign_jwt(user, role, None, SECRET, 600).expect("Failed to sign token");
        let mut request = self
            .client
            .request(method, format!("{}{}", self.address, path))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.send().await.expect("Failed to execute request")
    }
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: "unused".to_string(),
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        default_passing_score: 40.0,
        default_max_attempts: 1,
    };

    let service = AssessmentService::from_store(store.clone(), Defaults::from(&config));
    let app = routes::create_router(AppState {
        service: Arc::new(service),
        config,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

struct Seeded {
    test_id: String,
    mcq: String,
    essay: String,
}

/// A manually graded test: one single-choice question (key: option 2) and one essay.
async fn seed_manual_test(app: &TestApp) -> Seeded {
    let test_id = format!("t_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let mcq = format!("{}_mcq", test_id);
    let essay = format!("{}_essay", test_id);

    app.store
        .put_question(Question {
            id: mcq.clone(),
            question_type: QuestionType::SingleChoice,
            content: "Which one?".to_string(),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answer: Some(json!(2)),
            tolerance: None,
            solution: None,
            marks: 5.0,
            subject_id: Some("history".to_string()),
        })
        .await;
    app.store
        .put_question(Question {
            id: essay.clone(),
            question_type: QuestionType::Essay,
            content: "Discuss.".to_string(),
            options: vec![],
            correct_answer: None,
            tolerance: None,
            solution: None,
            marks: 5.0,
            subject_id: Some("writing".to_string()),
        })
        .await;

    app.store
        .put_test(TestDefinition {
            id: test_id.clone(),
            org_id: None,
            title: "Manual".to_string(),
            mode: TestMode::Classroom,
            status: TestStatus::Live,
            start_time: None,
            end_time: None,
            available_from: None,
            duration_minutes: None,
            sections: vec![SectionDef {
                name: "Only".to_string(),
                question_ids: vec![mcq.clone(), essay.clone()],
                time_limit_minutes: None,
            }],
            assigned_student_ids: vec![],
            assigned_class_ids: vec![],
            is_public: true,
            requires_manual_grading: true,
            passing_score: Some(60.0),
            randomize_questions: false,
            randomize_options: false,
            max_attempts: None,
        })
        .await;

    Seeded { test_id, mcq, essay }
}

/// Starts, answers both questions and submits. Returns the attempt id.
async fn sit_test(app: &TestApp, seeded: &Seeded, student: &str) -> String {
    let started: Value = app
        .send(
            reqwest::Method::POST,
            &format!("/api/tests/{}/attempts", seeded.test_id),
            student,
            ROLE_STUDENT,
            None,
        )
        .await
        .json()
        .await
        .unwrap();
    let attempt_id = started["attempt"]["id"].as_str().unwrap().to_string();

    for (qid, answer) in [(&seeded.mcq, json!(2)), (&seeded.essay, json!("An essay."))] {
        let saved = app
            .send(
                reqwest::Method::PUT,
                &format!("/api/attempts/{}/answers", attempt_id),
                student,
                ROLE_STUDENT,
                Some(json!({"question_id": qid, "answer": answer, "time_spent": 30})),
            )
            .await;
        assert_eq!(saved.status().as_u16(), 200);
    }

    let submitted = app
        .send(
            reqwest::Method::POST,
            &format!("/api/attempts/{}/submit", attempt_id),
            student,
            ROLE_STUDENT,
            None,
        )
        .await;
    assert_eq!(submitted.status().as_u16(), 200);
    attempt_id
}

#[tokio::test]
async fn students_cannot_reach_grading_routes() {
    let app = spawn_app().await;
    let seeded = seed_manual_test(&app).await;

    let response = app
        .send(
            reqwest::Method::POST,
            &format!("/api/grading/tests/{}/finalize", seeded.test_id),
            "student-1",
            ROLE_STUDENT,
            None,
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn grade_finalize_and_rank() {
    let app = spawn_app().await;
    let seeded = seed_manual_test(&app).await;
    let teacher = "teacher-1";

    let alice = sit_test(&app, &seeded, "alice").await;
    let bob = sit_test(&app, &seeded, "bob").await;

    // The objective part is already marked; the essay waits for a grader.
    let queue: Value = app
        .send(
            reqwest::Method::GET,
            &format!("/api/grading/tests/{}/ungraded", seeded.test_id),
            teacher,
            ROLE_TEACHER,
            None,
        )
        .await
        .json()
        .await
        .unwrap();
    let groups = queue.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["question_id"], seeded.essay.as_str());
    assert_eq!(groups[0]["answers"].as_array().unwrap().len(), 2);

    // Finalizing now names a blocking attempt and changes nothing.
    let blocked = app
        .send(
            reqwest::Method::POST,
            &format!("/api/grading/tests/{}/finalize", seeded.test_id),
            teacher,
            ROLE_TEACHER,
            None,
        )
        .await;
    assert_eq!(blocked.status().as_u16(), 400);
    let error: Value = blocked.json().await.unwrap();
    let message = error["error"].as_str().unwrap();
    assert!(message.contains(&alice) || message.contains(&bob));

    // Out-of-range marks are refused.
    let too_many = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/grading/attempts/{}/answers/{}", alice, seeded.essay),
            teacher,
            ROLE_TEACHER,
            Some(json!({"marks": 6.0})),
        )
        .await;
    assert_eq!(too_many.status().as_u16(), 400);

    let graded: Value = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/grading/attempts/{}/answers/{}", alice, seeded.essay),
            teacher,
            ROLE_TEACHER,
            Some(json!({"marks": 5.0, "feedback": "<b>Great</b><script>alert(1)</script>"})),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(graded["marks_awarded"], 5.0);
    assert_eq!(graded["is_correct"], true);
    assert!(!graded["feedback"].as_str().unwrap().contains("script"));

    // Bulk grading skips the unknown attempt and reports the applied count.
    let bulk: Value = app
        .send(
            reqwest::Method::POST,
            &format!(
                "/api/grading/tests/{}/questions/{}/bulk",
                seeded.test_id, seeded.essay
            ),
            teacher,
            ROLE_TEACHER,
            Some(json!({"grades": [
                {"attempt_id": bob, "marks": 0.0},
                {"attempt_id": "no-such-attempt", "marks": 3.0}
            ]})),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(bulk["graded"], 1);

    let finalized = app
        .send(
            reqwest::Method::POST,
            &format!("/api/grading/tests/{}/finalize", seeded.test_id),
            teacher,
            ROLE_TEACHER,
            None,
        )
        .await;
    assert_eq!(finalized.status().as_u16(), 200);
    let finalized: Value = finalized.json().await.unwrap();
    assert_eq!(finalized["graded"], 2);
    assert_eq!(finalized["skipped"], 0);
    assert_eq!(finalized["ranked"], 2);

    // Alice: 10/10, Bob: 5/10.
    let alice_result: Value = app
        .send(
            reqwest::Method::GET,
            &format!("/api/attempts/{}/result", alice),
            "alice",
            ROLE_STUDENT,
            None,
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(alice_result["percentage"], 100.0);
    assert_eq!(alice_result["rank"], 1);
    assert_eq!(alice_result["percentile"], 50.0);
    assert_eq!(alice_result["is_passing"], true);
    assert_eq!(alice_result["subjective_marks"], 5.0);
    assert_eq!(alice_result["objective_marks"], 5.0);

    let bob_result: Value = app
        .send(
            reqwest::Method::GET,
            &format!("/api/attempts/{}/result", bob),
            "bob",
            ROLE_STUDENT,
            None,
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(bob_result["percentage"], 50.0);
    assert_eq!(bob_result["rank"], 2);
    assert_eq!(bob_result["percentile"], 0.0);
    assert_eq!(bob_result["is_passing"], false);

    // Everything is graded; further grades are refused.
    let listed: Value = app
        .send(
            reqwest::Method::GET,
            &format!("/api/grading/tests/{}/attempts?status=graded", seeded.test_id),
            teacher,
            ROLE_TEACHER,
            None,
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let late = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/grading/attempts/{}/answers/{}", bob, seeded.essay),
            teacher,
            ROLE_TEACHER,
            Some(json!({"marks": 1.0})),
        )
        .await;
    assert_eq!(late.status().as_u16(), 400);

    // Per-question counters.
    let mcq = app.store.performance(&seeded.mcq).await.unwrap();
    assert_eq!(mcq.total_attempts, 2);
    assert_eq!(mcq.correct_attempts, 2);
    let essay = app.store.performance(&seeded.essay).await.unwrap();
    assert_eq!(essay.total_attempts, 2);
    assert_eq!(essay.correct_attempts, 1);

    // Analytics requests are fire-and-forget; give the task a moment.
    let mut requests = Vec::new();
    for _ in 0..50 {
        requests = app.store.analytics_requests().await;
        if requests.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|(_, test)| test == &seeded.test_id));

    // A second finalize has nothing left to grade.
    let again = app
        .send(
            reqwest::Method::POST,
            &format!("/api/grading/tests/{}/finalize", seeded.test_id),
            teacher,
            ROLE_TEACHER,
            None,
        )
        .await;
    assert_eq!(again.status().as_u16(), 400);
}

async fn grade_essay(app: &TestApp, attempt_id: &str, essay: &str, marks: f64) {
    let response = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/grading/attempts/{}/answers/{}", attempt_id, essay),
            "teacher-1",
            ROLE_TEACHER,
            Some(json!({ "marks": marks })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn finalize_after_interruption_skips_graded_attempts() {
    let app = spawn_app().await;
    let seeded = seed_manual_test(&app).await;

    let alice = sit_test(&app, &seeded, "alice").await;
    let bob = sit_test(&app, &seeded, "bob").await;
    grade_essay(&app, &alice, &seeded.essay, 5.0).await;
    grade_essay(&app, &bob, &seeded.essay, 2.0).await;

    // An earlier finalization got as far as Alice before stopping.
    let questions: HashMap<String, Question> = app
        .store
        .get_questions(&[seeded.mcq.clone(), seeded.essay.clone()])
        .await
        .unwrap()
        .into_iter()
        .map(|q| (q.id.clone(), q))
        .collect();
    let test = app.store.get_test(&seeded.test_id).await.unwrap().unwrap();
    let mut earlier = app.store.find(&alice).await.unwrap().unwrap();
    earlier.result = Some(scoring::compute_result(&earlier, &test, &questions, 40.0));
    earlier.status = AttemptStatus::Graded;
    app.store.save(&earlier).await.unwrap();

    let finalized = app
        .send(
            reqwest::Method::POST,
            &format!("/api/grading/tests/{}/finalize", seeded.test_id),
            "teacher-2",
            ROLE_TEACHER,
            None,
        )
        .await;
    assert_eq!(finalized.status().as_u16(), 200);
    let finalized: Value = finalized.json().await.unwrap();
    assert_eq!(finalized["graded"], 1);
    assert_eq!(finalized["skipped"], 1);
    assert_eq!(finalized["ranked"], 2);

    // Alice was left as the earlier call wrote her; Bob was finalized now.
    let alice_now = app.store.find(&alice).await.unwrap().unwrap();
    assert_eq!(alice_now.status, AttemptStatus::Graded);
    assert!(alice_now.graded_by.is_none());
    let bob_now = app.store.find(&bob).await.unwrap().unwrap();
    assert_eq!(bob_now.status, AttemptStatus::Graded);
    assert_eq!(bob_now.graded_by.as_deref(), Some("teacher-2"));

    // Ranking covers both.
    let alice_result = alice_now.result.unwrap();
    assert_eq!(alice_result.rank, Some(1));
    assert_eq!(alice_result.percentile, Some(50.0));
    let bob_result = bob_now.result.unwrap();
    assert_eq!(bob_result.marks_obtained, 7.0);
    assert_eq!(bob_result.rank, Some(2));

    // Counters only reflect Bob's answers.
    let mcq = app.store.performance(&seeded.mcq).await.unwrap();
    assert_eq!((mcq.total_attempts, mcq.correct_attempts), (1, 1));
    let essay = app.store.performance(&seeded.essay).await.unwrap();
    assert_eq!((essay.total_attempts, essay.correct_attempts), (1, 1));
}

#[tokio::test]
async fn bulk_grading_skips_every_bad_tuple() {
    let app = spawn_app().await;
    let seeded = seed_manual_test(&app).await;
    let other = seed_manual_test(&app).await;

    let alice = sit_test(&app, &seeded, "alice").await;
    let bob = sit_test(&app, &seeded, "bob").await;
    let carol = sit_test(&app, &seeded, "carol").await;
    let outsider = sit_test(&app, &other, "dave").await;

    // Still in progress.
    let started: Value = app
        .send(
            reqwest::Method::POST,
            &format!("/api/tests/{}/attempts", seeded.test_id),
            "erin",
            ROLE_STUDENT,
            None,
        )
        .await
        .json()
        .await
        .unwrap();
    let live = started["attempt"]["id"].as_str().unwrap().to_string();

    let bulk: Value = app
        .send(
            reqwest::Method::POST,
            &format!(
                "/api/grading/tests/{}/questions/{}/bulk",
                seeded.test_id, seeded.essay
            ),
            "teacher-1",
            ROLE_TEACHER,
            Some(json!({"grades": [
                {"attempt_id": alice, "marks": 6.0},
                {"attempt_id": bob, "marks": -1.0},
                {"attempt_id": carol, "marks": 2.0, "feedback": "x".repeat(5001)},
                {"attempt_id": outsider, "marks": 3.0},
                {"attempt_id": live, "marks": 3.0},
                {"attempt_id": carol, "marks": 4.0}
            ]})),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(bulk["graded"], 1);

    let essay_marks = |attempt: &assessment_backend::models::attempt::Attempt, qid: &str| {
        attempt.answer(qid).and_then(|a| a.marks_awarded)
    };
    let alice_now = app.store.find(&alice).await.unwrap().unwrap();
    assert_eq!(essay_marks(&alice_now, &seeded.essay), None);
    let bob_now = app.store.find(&bob).await.unwrap().unwrap();
    assert_eq!(essay_marks(&bob_now, &seeded.essay), None);
    let carol_now = app.store.find(&carol).await.unwrap().unwrap();
    assert_eq!(essay_marks(&carol_now, &seeded.essay), Some(4.0));
    assert!(carol_now.answer(&seeded.essay).unwrap().feedback.is_none());
    let outsider_now = app.store.find(&outsider).await.unwrap().unwrap();
    assert_eq!(essay_marks(&outsider_now, &other.essay), None);
    let live_now = app.store.find(&live).await.unwrap().unwrap();
    assert_eq!(live_now.status, AttemptStatus::InProgress);
    assert!(live_now.answers.is_empty());
}
