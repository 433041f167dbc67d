use chrono::Utc;
use navispot::{
    catalog::SourceCatalog,
    error::CatalogError,
    management::{Token, TokenManager},
    spotify::SpotifyClient,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path, query_param},
};

fn valid_token() -> Token {
    Token {
        access_token: "tok".to_string(),
        refresh_token: "refresh".to_string(),
        scope: String::new(),
        expires_in: 3600,
        obtained_at: Utc::now().timestamp() as u64,
    }
}

fn client(server: &MockServer, token: Token, dir: &tempfile::TempDir) -> SpotifyClient {
    let tokens = TokenManager::new(token, format!("{}/api/token", server.uri()), "client-id")
        .with_path(dir.path().join("token.json"));
    SpotifyClient::new(server.uri(), tokens)
}

fn track(id: &str, name: &str) -> serde_json::Value {
    json!({
        "track": {
            "id": id,
            "name": name,
            "type": "track",
            "artists": [{ "name": "Band" }, { "name": "Guest" }],
            "album": { "name": "Record" },
            "duration_ms": 201000,
            "external_ids": { "isrc": format!("ISRC-{id}") }
        }
    })
}

#[tokio::test]
async fn test_playlist_tracks_follow_next_links() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/playlists/sp1/tracks"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [track("t3", "Third")],
            "next": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/playlists/sp1/tracks"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                track("t1", "First"),
                { "track": null },
                { "is_local": true, "track": { "id": null, "name": "Local file" } },
                { "track": { "id": "ep1", "name": "Episode", "type": "episode" } },
                track("t2", "Second")
            ],
            "next": format!("{}/playlists/sp1/tracks?limit=100&offset=100", server.uri())
        })))
        .mount(&server)
        .await;

    let tracks = client(&server, valid_token(), &dir)
        .list_playlist_tracks("sp1")
        .await
        .unwrap();

    let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);

    let first = &tracks[0];
    assert_eq!(first.title, "First");
    assert_eq!(first.artists, vec!["Band", "Guest"]);
    assert_eq!(first.album, "Record");
    assert_eq!(first.duration_ms, 201_000);
    assert_eq!(first.isrc.as_deref(), Some("ISRC-t1"));
}

#[tokio::test]
async fn test_list_playlists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "sp1", "name": "Mix", "snapshot_id": "snap-1", "tracks": { "total": 12 } },
                { "id": "sp2", "name": "Bare" }
            ],
            "next": null
        })))
        .mount(&server)
        .await;

    let playlists = client(&server, valid_token(), &dir)
        .list_playlists()
        .await
        .unwrap();

    assert_eq!(playlists.len(), 2);
    assert_eq!(playlists[0].track_count, 12);
    assert_eq!(playlists[0].snapshot_id, "snap-1");

    // Missing fields fall back to defaults
    assert_eq!(playlists[1].track_count, 0);
    assert_eq!(playlists[1].snapshot_id, "");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_cached() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600,
            "scope": "user-library-read"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [track("t1", "Liked")],
            "next": null
        })))
        .mount(&server)
        .await;

    let saved = client(&server, Token::from_refresh_token("refresh".to_string()), &dir)
        .list_saved_tracks()
        .await
        .unwrap();
    assert_eq!(saved.len(), 1);

    // The refreshed token keeps the old refresh token and lands on disk
    let cached = std::fs::read_to_string(dir.path().join("token.json")).unwrap();
    let token: Token = serde_json::from_str(&cached).unwrap();
    assert_eq!(token.access_token, "fresh");
    assert_eq!(token.refresh_token, "refresh");
}

#[tokio::test]
async fn test_failed_refresh_without_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let result = client(&server, Token::from_refresh_token("refresh".to_string()), &dir)
        .list_playlists()
        .await;
    assert!(matches!(result, Err(CatalogError::Auth(_))));
}

#[tokio::test]
async fn test_long_rate_limit_is_an_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/me/playlists"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3600"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, valid_token(), &dir).list_playlists().await;
    match result {
        Err(CatalogError::Api { status, .. }) => assert_eq!(status, 429),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/playlists/missing/tracks"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let result = client(&server, valid_token(), &dir)
        .list_playlist_tracks("missing")
        .await;
    match result {
        Err(CatalogError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not found");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
