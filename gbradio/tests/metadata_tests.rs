//! Integration tests for the title poller and the HTTP title source

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedSource;
use gbradio::{
    DEFAULT_TITLE, FALLBACK_TITLE, FetchError, HttpTitleSource, MetadataPoller, TitleSource,
};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTERVAL: Duration = Duration::from_secs(15);

fn poller(source: &Arc<ScriptedSource>) -> MetadataPoller<ScriptedSource> {
    MetadataPoller::with_settings(source.clone(), INTERVAL, DEFAULT_TITLE, FALLBACK_TITLE)
}

/// Let the spawned poll loop run until it is idle again.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_initial_title_before_start() {
    let source = ScriptedSource::always("Shabad X");
    let poller = poller(&source);

    assert_eq!(poller.current_title(), DEFAULT_TITLE);
    assert!(!poller.is_running());
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn test_poll_once_trims_title() {
    let source = ScriptedSource::always("  Shabad X  ");
    let poller = poller(&source);

    assert_eq!(poller.poll_once().await, "Shabad X");
    assert_eq!(poller.current_title(), "Shabad X");
}

#[tokio::test]
async fn test_poll_once_empty_body_falls_back() {
    let source = ScriptedSource::always("");
    let poller = poller(&source);

    assert_eq!(poller.poll_once().await, FALLBACK_TITLE);
}

#[tokio::test]
async fn test_poll_once_failure_falls_back() {
    let source = ScriptedSource::new(vec![Err(FetchError::Timeout)]);
    let poller = poller(&source);

    assert_eq!(poller.poll_once().await, FALLBACK_TITLE);
}

#[tokio::test(start_paused = true)]
async fn test_start_fetches_immediately() {
    let source = ScriptedSource::always("Shabad X");
    let poller = poller(&source);
    let mut titles = poller.subscribe();

    poller.start();
    titles.changed().await.unwrap();

    assert_eq!(*titles.borrow(), "Shabad X");
    assert_eq!(source.fetches(), 1);
    assert!(poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_polls_on_fixed_interval() {
    let source = ScriptedSource::new(vec![
        Ok("First".to_string()),
        Err(FetchError::Status(502)),
        Ok("  Third ".to_string()),
    ]);
    let poller = poller(&source);

    poller.start();
    settle().await;
    assert_eq!(source.fetches(), 1);
    assert_eq!(poller.current_title(), "First");

    tokio::time::sleep(INTERVAL).await;
    settle().await;
    assert_eq!(source.fetches(), 2);
    assert_eq!(poller.current_title(), FALLBACK_TITLE);

    // Pas de nouvel essai avant la fin de l'intervalle
    tokio::time::sleep(INTERVAL / 2).await;
    settle().await;
    assert_eq!(source.fetches(), 2);

    tokio::time::sleep(INTERVAL / 2).await;
    settle().await;
    assert_eq!(source.fetches(), 3);
    assert_eq!(poller.current_title(), "Third");

    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_fetches() {
    let source = ScriptedSource::always("Shabad X");
    let poller = poller(&source);

    poller.start();
    settle().await;
    assert_eq!(source.fetches(), 1);

    poller.stop();
    assert!(!poller.is_running());

    tokio::time::sleep(INTERVAL * 4).await;
    settle().await;
    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_safe_before_start() {
    let source = ScriptedSource::always("Shabad X");
    let poller = poller(&source);

    poller.stop();
    poller.start();
    settle().await;
    poller.stop();
    poller.stop();

    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_runs_one_loop() {
    let source = ScriptedSource::always("Shabad X");
    let poller = poller(&source);

    poller.start();
    poller.start();
    settle().await;
    assert_eq!(source.fetches(), 1);

    tokio::time::sleep(INTERVAL).await;
    settle().await;
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let source = ScriptedSource::always("Shabad X");
    let poller = poller(&source);

    poller.start();
    settle().await;
    poller.stop();
    poller.start();
    settle().await;

    assert_eq!(source.fetches(), 2);
    assert!(poller.is_running());
}

#[test]
fn test_interval_has_a_floor() {
    let source = ScriptedSource::always("x");
    let poller = MetadataPoller::with_settings(
        source,
        Duration::from_millis(10),
        DEFAULT_TITLE,
        FALLBACK_TITLE,
    );
    assert_eq!(poller.interval(), Duration::from_secs(1));
}

#[tokio::test]
async fn test_http_source_reads_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/currentsong"))
        .and(query_param("sid", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  Asa Di Vaar \n"))
        .mount(&mock_server)
        .await;

    let source =
        HttpTitleSource::new(format!("{}/currentsong?sid=1", mock_server.uri())).unwrap();

    let body = assert_ok!(source.fetch_title().await);
    assert_eq!(body, "  Asa Di Vaar \n");
}

#[tokio::test]
async fn test_http_source_rejects_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/currentsong"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Shabad X"))
        .mount(&mock_server)
        .await;

    let source = HttpTitleSource::new(format!("{}/currentsong", mock_server.uri())).unwrap();

    let err = assert_err!(source.fetch_title().await);
    assert!(matches!(err, FetchError::Status(503)));
}

#[tokio::test]
async fn test_http_source_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/currentsong"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let source = HttpTitleSource::new(format!("{}/currentsong", mock_server.uri()))
        .unwrap()
        .timeout(Duration::from_millis(100));

    let err = assert_err!(source.fetch_title().await);
    assert!(matches!(err, FetchError::Timeout));
}

#[tokio::test]
async fn test_http_source_unreachable_falls_back() {
    // Port fermé : la requête échoue immédiatement
    let source = Arc::new(HttpTitleSource::new("http://127.0.0.1:9/currentsong").unwrap());
    let poller =
        MetadataPoller::with_settings(source, INTERVAL, DEFAULT_TITLE, FALLBACK_TITLE);

    assert_eq!(poller.poll_once().await, FALLBACK_TITLE);
}

#[tokio::test]
async fn test_poller_with_http_source() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/currentsong"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  Shabad X  "))
        .mount(&mock_server)
        .await;

    let source =
        Arc::new(HttpTitleSource::new(format!("{}/currentsong", mock_server.uri())).unwrap());
    let poller =
        MetadataPoller::with_settings(source, INTERVAL, DEFAULT_TITLE, FALLBACK_TITLE);
    let mut titles = poller.subscribe();

    poller.start();
    titles.changed().await.unwrap();
    assert_eq!(*titles.borrow(), "Shabad X");

    poller.stop();
}
