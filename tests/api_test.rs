use axum::http::{Method, StatusCode};
use serde_json::json;

use lexilens::services::{FrqGrade, ServiceError};

mod common;

use common::{create_test_app, definition, fixture, send, term, ScriptedDefinitions, USER};

const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

#[tokio::test]
async fn health_endpoints() {
    let fx = fixture(Vec::new(), ScriptedDefinitions::default());
    let app = create_test_app(&fx);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/health/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let fx = fixture(Vec::new(), ScriptedDefinitions::default());
    let app = create_test_app(&fx);

    let (status, body) = send(&app, Method::GET, "/api/nope", Some(USER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn user_header_is_required() {
    let fx = fixture(vec![term("correr", 0)], ScriptedDefinitions::default());
    let app = create_test_app(&fx);

    let (status, body) = send(&app, Method::GET, "/api/terms", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn dictionary_sections_search_and_remove() {
    let fx = fixture(
        vec![term("correr", 0), term("comer", 1), term("beber", 3)],
        ScriptedDefinitions::default(),
    );
    let app = create_test_app(&fx);

    let (status, body) = send(&app, Method::GET, "/api/terms", Some(USER), None).await;
    assert_eq!(status, StatusCode::OK);
    let sections = body["data"]["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0]["header"]["tier"], "unfamiliar");
    assert_eq!(sections[0]["count"], 1);
    assert_eq!(sections[2]["header"]["score"], 3);
    assert_eq!(body["data"]["total"], 3);

    let (_, body) = send(&app, Method::GET, "/api/terms?search=CO", Some(USER), None).await;
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = send(&app, Method::GET, "/api/terms?tier=mastered", Some(USER), None).await;
    let sections = body["data"]["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0]["terms"][0]["key"], "beber");

    let (status, _) = send(&app, Method::GET, "/api/terms?tier=expert", Some(USER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::DELETE, "/api/terms/correr", Some(USER), None).await;
    assert_eq!(status, StatusCode::OK);
    let tiers: Vec<&str> = body["data"]["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["header"]["tier"].as_str().unwrap())
        .collect();
    assert_eq!(tiers, vec!["familiar", "mastered"]);
}

#[tokio::test]
async fn lookup_saves_the_highlighted_word() {
    let fx = fixture(vec![term("correr", 2)], ScriptedDefinitions::default());
    fx.definitions.push_lookup(Ok(definition("saltar")));
    let app = create_test_app(&fx);

    let body = json!({
        "image": PIXEL,
        "mimeType": "image/png",
        "strokes": [[{"x": 10.0, "y": 40.0}, {"x": 80.0, "y": 42.0}]],
        "canvasWidth": 300.0,
        "canvasHeight": 600.0
    });
    let (status, resp) = send(&app, Method::POST, "/api/terms/lookup", Some(USER), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["data"]["key"], "saltar");
    assert_eq!(resp["data"]["score"], 0);

    // a word seen before keeps its score
    let (status, resp) = send(&app, Method::POST, "/api/terms/lookup", Some(USER), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["data"]["key"], "correr");
    assert_eq!(resp["data"]["score"], 2);
}

#[tokio::test]
async fn words_with_path_characters_can_be_captured_and_removed() {
    let fx = fixture(Vec::new(), ScriptedDefinitions::default());
    fx.definitions.push_lookup(Ok(definition("etc.")));
    let app = create_test_app(&fx);

    let body = json!({
        "image": PIXEL,
        "strokes": [[{"x": 10.0, "y": 40.0}, {"x": 80.0, "y": 42.0}]],
        "canvasWidth": 300.0,
        "canvasHeight": 600.0
    });
    let (status, resp) = send(&app, Method::POST, "/api/terms/lookup", Some(USER), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["data"]["key"], "etc.");

    let (status, resp) = send(&app, Method::DELETE, "/api/terms/etc.", Some(USER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["total"], 0);
}

#[tokio::test]
async fn views_carry_the_term_set_version() {
    let fx = fixture(vec![term("correr", 0), term("comer", 0)], ScriptedDefinitions::default());
    let app = create_test_app(&fx);

    let (_, body) = send(&app, Method::GET, "/api/terms", Some(USER), None).await;
    let before = body["data"]["version"].clone();
    assert!(before.is_string());

    let (_, body) = send(&app, Method::POST, "/api/study/sessions", Some(USER), None).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["version"], before);
    let uri = format!("/api/study/sessions/{id}");
    let (_, body) = send(&app, Method::GET, &uri, Some(USER), None).await;
    assert_eq!(body["data"]["stale"], false);

    let (_, body) = send(&app, Method::DELETE, "/api/terms/comer", Some(USER), None).await;
    assert_ne!(body["data"]["version"], before);
    let (_, body) = send(&app, Method::GET, &uri, Some(USER), None).await;
    assert_eq!(body["data"]["stale"], true);
}

#[tokio::test]
async fn lookup_validation_and_service_errors() {
    let fx = fixture(Vec::new(), ScriptedDefinitions::default());
    fx.definitions
        .push_lookup(Err(ServiceError::Malformed("definition: missing field".into())));
    let app = create_test_app(&fx);

    let empty = json!({
        "image": PIXEL,
        "strokes": [],
        "canvasWidth": 300.0,
        "canvasHeight": 600.0
    });
    let (status, body) = send(&app, Method::POST, "/api/terms/lookup", Some(USER), Some(empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let bad_image = json!({
        "image": "%%%",
        "strokes": [[{"x": 1.0, "y": 1.0}]],
        "canvasWidth": 300.0,
        "canvasHeight": 600.0
    });
    let (status, _) = send(&app, Method::POST, "/api/terms/lookup", Some(USER), Some(bad_image)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let ok = json!({
        "image": PIXEL,
        "strokes": [[{"x": 1.0, "y": 1.0}]],
        "canvasWidth": 300.0,
        "canvasHeight": 600.0
    });
    let (status, body) = send(&app, Method::POST, "/api/terms/lookup", Some(USER), Some(ok)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "MALFORMED_SERVICE_RESPONSE");
}

#[tokio::test]
async fn flashcard_session_over_http() {
    let fx = fixture(vec![term("correr", 0)], ScriptedDefinitions::default());
    let app = create_test_app(&fx);

    let (status, body) = send(&app, Method::POST, "/api/study/sessions", Some(USER), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["phase"], "presenting");
    assert_eq!(body["data"]["current"]["itemType"], "flashcard");
    assert!(body["data"]["current"]["back"].is_null());

    let base = format!("/api/study/sessions/{id}");
    let (status, body) = send(&app, Method::POST, &format!("{base}/answer"), Some(USER), Some(json!({"recall": true}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_SESSION_STATE");

    let (_, body) = send(&app, Method::POST, &format!("{base}/flip"), Some(USER), None).await;
    assert_eq!(body["data"]["current"]["isFrontFacing"], false);
    assert_eq!(body["data"]["current"]["back"], "correr translated definition");

    let (status, body) = send(&app, Method::POST, &format!("{base}/answer"), Some(USER), Some(json!({"recall": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current"]["outcome"], "correct");
    assert_eq!(body["data"]["current"]["score"], 1);
    assert_eq!(fx.store.score_of("correr"), Some(1));

    let (_, body) = send(&app, Method::POST, &format!("{base}/advance"), Some(USER), None).await;
    assert_eq!(body["data"]["phase"], "complete");
    assert_eq!(body["data"]["summary"]["correct"], 1);

    let (status, body) = send(&app, Method::POST, &format!("{base}/advance"), Some(USER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SESSION_FINISHED");
}

#[tokio::test]
async fn mcq_answer_reveals_correct_choice() {
    let fx = fixture(vec![term("comer", 1)], ScriptedDefinitions::default());
    let app = create_test_app(&fx);

    let (_, body) = send(&app, Method::POST, "/api/study/sessions", Some(USER), None).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["current"]["choices"]["B"], "comer meaning");
    assert!(body["data"]["current"]["correctChoice"].is_null());

    let uri = format!("/api/study/sessions/{id}/answer");
    let (_, body) = send(&app, Method::POST, &uri, Some(USER), Some(json!({"choice": "a"}))).await;
    assert_eq!(body["data"]["current"]["outcome"], "incorrect");
    assert_eq!(body["data"]["current"]["correctChoice"], "B");
    assert_eq!(body["data"]["current"]["submittedChoice"], "A");

    let (status, body) = send(&app, Method::POST, &uri, Some(USER), Some(json!({"choice": "B"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current"]["outcome"], "incorrect");
    assert_eq!(fx.store.score_of("comer"), Some(1));
}

#[tokio::test]
async fn frq_grading_outage_surfaces_retry() {
    let fx = fixture(vec![term("vivir", 2)], ScriptedDefinitions::default());
    fx.definitions
        .push_grade(Err(ServiceError::Unavailable("timeout".into())));
    fx.definitions.push_grade(Ok(FrqGrade {
        correct: true,
        feedback: None,
    }));
    let app = create_test_app(&fx);

    let (_, body) = send(&app, Method::POST, "/api/study/sessions", Some(USER), None).await;
    let base = format!("/api/study/sessions/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{base}/answer"),
        Some(USER),
        Some(json!({"response": "Quiero vivir aquí."})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

    let (_, body) = send(&app, Method::GET, &base, Some(USER), None).await;
    assert_eq!(body["data"]["current"]["status"], "pending_grade");

    let (status, body) = send(&app, Method::POST, &format!("{base}/advance"), Some(USER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "GRADE_PENDING");

    let (status, body) = send(&app, Method::POST, &format!("{base}/retry"), Some(USER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current"]["status"], "answered");
    assert_eq!(fx.store.score_of("vivir"), Some(3));
}

#[tokio::test]
async fn sessions_are_private_and_abandonable() {
    let fx = fixture(vec![term("correr", 0)], ScriptedDefinitions::default());
    let app = create_test_app(&fx);

    let (_, body) = send(&app, Method::POST, "/api/study/sessions", Some(USER), None).await;
    let base = format!("/api/study/sessions/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &base, Some("someone-else"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::DELETE, &base, Some(USER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "abandoned");

    let (status, _) = send(&app, Method::GET, &base, Some(USER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
