mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{method, path, query_param},
};

use vibeify::spotify::summary::{average_features, fetch_audio_features};

use common::{TestApp, json_body};

fn artist(id: &str, genres: &[&str]) -> Value {
    json!({ "id": id, "name": format!("Artist {id}"), "genres": genres })
}

fn track(id: &str) -> Value {
    json!({ "id": id, "name": format!("Track {id}"), "artists": [{ "name": "Someone" }] })
}

fn page(items: Vec<Value>) -> Value {
    json!({ "items": items })
}

fn features(id: &str) -> Value {
    json!({
        "id": id,
        "danceability": 0.6,
        "energy": 0.7,
        "valence": 0.5,
        "acousticness": 0.2,
        "instrumentalness": 0.0,
        "liveness": 0.1,
        "speechiness": 0.04,
        "tempo": 118.0
    })
}

/// Answers `/audio-features` for whatever ids were asked, in reverse order,
/// with `null` for ids ending in `7`.
struct EchoFeatures;

impl Respond for EchoFeatures {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let ids = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "ids")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        let body: Vec<Value> = ids
            .split(',')
            .rev()
            .map(|id| if id.ends_with('7') { Value::Null } else { features(id) })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "audio_features": body }))
    }
}

async fn mount_json(server: &MockServer, route: &str, range: Option<&str>, body: Value) {
    let mut mock = Mock::given(method("GET")).and(path(route));
    if let Some(range) = range {
        mock = mock.and(query_param("time_range", range));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_listening_history(server: &MockServer) {
    let profile = json!({ "id": "listener", "display_name": "Listener" });
    mount_json(server, "/v1/me", None, profile).await;

    mount_json(
        server,
        "/v1/me/top/artists",
        Some("short_term"),
        page(vec![
            artist("a1", &["indie pop", "bedroom pop"]),
            artist("a2", &["indie pop"]),
        ]),
    )
    .await;

    mount_json(server, "/v1/me/top/tracks", Some("short_term"), page(vec![])).await;
    mount_json(
        server,
        "/v1/me/top/tracks",
        Some("medium_term"),
        page(vec![track("m1"), track("m2"), track("m3")]),
    )
    .await;
    mount_json(server, "/v1/me/top/tracks", Some("long_term"), page(vec![track("l1")])).await;

    mount_json(
        server,
        "/v1/me/player/recently-played",
        None,
        page(vec![json!({ "track": track("r1"), "played_at": "2024-06-01T10:00:00Z" })]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(EchoFeatures)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_summary_tolerates_failed_playlists() {
    let server = MockServer::start().await;
    mount_listening_history(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = TestApp::new(&server);
    let session_id = app.live_session().await;
    let cookie = app.session_cookie(&session_id);

    let response = app.get("/api/vibe-summary", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert!(body["errors"]["playlists"].is_string());
    assert_eq!(body["errors"].as_object().unwrap().len(), 1);
    assert_eq!(body["playlists"], json!([]));

    assert_eq!(body["profile"]["id"], "listener");
    assert_eq!(body["topArtists"]["source"], "short_term");
    assert_eq!(body["topArtists"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["recentlyPlayed"].as_array().unwrap().len(), 1);
    assert_eq!(body["topGenres"][0], json!({ "genre": "indie pop", "count": 2 }));
    assert_eq!(body["audioFeatures"]["sampleSize"], 3);
    assert_eq!(body["mood"]["energy"], 70);
}

#[tokio::test]
async fn test_top_tracks_use_first_non_empty_range() {
    let server = MockServer::start().await;
    mount_listening_history(&server).await;
    mount_json(&server, "/v1/me/playlists", None, page(vec![])).await;
    let app = TestApp::new(&server);
    let session_id = app.live_session().await;
    let cookie = app.session_cookie(&session_id);

    let body = json_body(app.get("/api/vibe-summary", Some(&cookie)).await).await;

    assert_eq!(body["topTracks"]["source"], "medium_term");
    let ids: Vec<&str> = body["topTracks"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert!(body["errors"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_top_tracks_fall_back_to_recently_played() {
    let server = MockServer::start().await;
    mount_json(&server, "/v1/me", None, json!({ "id": "listener" })).await;
    mount_json(&server, "/v1/me/top/artists", None, page(vec![])).await;
    mount_json(&server, "/v1/me/top/tracks", None, page(vec![])).await;
    mount_json(&server, "/v1/me/playlists", None, page(vec![])).await;
    mount_json(
        &server,
        "/v1/me/player/recently-played",
        None,
        page(vec![
            json!({ "track": track("x"), "played_at": "2024-06-01T12:00:00Z" }),
            json!({ "track": track("y"), "played_at": "2024-06-01T11:00:00Z" }),
            json!({ "track": track("x"), "played_at": "2024-06-01T10:00:00Z" }),
            json!({ "track": track("z"), "played_at": "2024-06-01T09:00:00Z" }),
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(EchoFeatures)
        .mount(&server)
        .await;
    let app = TestApp::new(&server);
    let session_id = app.live_session().await;
    let cookie = app.session_cookie(&session_id);

    let body = json_body(app.get("/api/vibe-summary?limit=2", Some(&cookie)).await).await;

    assert_eq!(body["topTracks"]["source"], "recently_played");
    let ids: Vec<&str> = body["topTracks"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["x", "y"]);

    assert_eq!(body["topArtists"]["source"], Value::Null);
    assert_eq!(body["topGenres"], json!([]));
}

#[tokio::test]
async fn test_summary_rejects_revoked_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "status": 401, "message": "The access token expired" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::new(&server);
    let session_id = app.live_session().await;
    let cookie = app.session_cookie(&session_id);

    let response = app.get("/api/vibe-summary", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_audio_features_are_batched_per_hundred() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(EchoFeatures)
        .expect(2)
        .mount(&server)
        .await;
    let app = TestApp::new(&server);
    let session_id = app.live_session().await;
    let ids: Vec<String> = (0..150).map(|i| format!("t{i}")).collect();

    let (features, error) = fetch_audio_features(&app.state.api, &session_id, &ids).await;

    assert!(error.is_none());
    assert_eq!(features.len(), 150);
    for (id, entry) in ids.iter().zip(&features) {
        match entry {
            Some(f) => assert_eq!(&f.id, id),
            None => assert!(id.ends_with('7'), "{id} should have features"),
        }
    }

    // t7, t17, ..., t147 have no features and are left out of the mean.
    let averages = average_features(&features).unwrap();
    assert_eq!(averages.sample_size, 135);
    assert!((averages.energy - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_failed_chunk_leaves_others_intact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .and(query_param("ids", "bad"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(EchoFeatures)
        .mount(&server)
        .await;
    let app = TestApp::new(&server);
    let session_id = app.live_session().await;
    let mut ids: Vec<String> = (0..100).map(|i| format!("ok{i}")).collect();
    ids.push("bad".into());

    let (features, error) = fetch_audio_features(&app.state.api, &session_id, &ids).await;

    assert!(error.is_some());
    assert_eq!(features.len(), 101);
    assert!(features[100].is_none());
    assert_eq!(features.iter().flatten().count(), 90);
}

#[tokio::test]
async fn test_audio_features_route() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(EchoFeatures)
        .expect(1)
        .mount(&server)
        .await;
    let app = TestApp::new(&server);
    let session_id = app.live_session().await;
    let cookie = app.session_cookie(&session_id);

    let response = app
        .get("/api/audio-features?ids=a1,b2,a1", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let list = body["audio_features"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], "a1");

    let response = app.get("/api/audio-features", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
