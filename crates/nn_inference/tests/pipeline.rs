use std::sync::Arc;

use axum::http::StatusCode;
use axum::{routing::post, Router};
use chrono::{Duration, Utc};
use nn_core::{Article, Category, Media, NewsStorage};
use nn_inference::grouping::{filter_grouped_news, group_pending, Grouper, GroupingClient, StaticToken};
use nn_inference::Config;
use nn_storage::MemoryStorage;

const HOUSING: &str = "El Congreso aprueba la reforma de la ley de vivienda con el apoyo de los socios del Gobierno";
const FOOTBALL: &str = "El Betis remonta en el último minuto y se mete en la final de la Conference League";

fn article(body: &str, link: &str, medium: Media) -> Article {
    Article::new(link, body, Category::Politica, link, medium)
}

#[tokio::test]
async fn test_grouping_passes_keep_group_numbers() {
    let storage = MemoryStorage::new();
    let grouper = Grouper::from_config(&Config::default()).unwrap();

    storage
        .store_articles(&[
            article(HOUSING, "abc-1", Media::Abc),
            article(HOUSING, "pais-1", Media::ElPais),
            article(FOOTBALL, "cope-1", Media::Cope),
        ])
        .await
        .unwrap();

    assert_eq!(group_pending(&storage, &grouper).await.unwrap(), 2);
    let groups = filter_grouped_news(&storage.all_articles().await.unwrap());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0][0].group, Some(0));

    // A later pass: the same story from a new outlet joins the existing group,
    // a second copy from an outlet already in it does not.
    storage
        .store_articles(&[
            article(HOUSING, "rtve-1", Media::Rtve),
            article(HOUSING, "abc-2", Media::Abc),
        ])
        .await
        .unwrap();
    assert_eq!(group_pending(&storage, &grouper).await.unwrap(), 1);

    let all = storage.all_articles().await.unwrap();
    let group_of = |link: &str| all.iter().find(|a| a.link == link).and_then(|a| a.group);
    assert_eq!(group_of("rtve-1"), Some(0));
    assert_eq!(group_of("abc-2"), None);
    assert_eq!(group_of("cope-1"), None);

    let groups = filter_grouped_news(&all);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 3);
}

#[tokio::test]
async fn test_nothing_pending() {
    let storage = MemoryStorage::new();
    let grouper = Grouper::from_config(&Config::default()).unwrap();
    assert_eq!(group_pending(&storage, &grouper).await.unwrap(), 0);
}

#[tokio::test]
async fn test_group_numbers_not_reused_after_quiet_window() {
    let storage = MemoryStorage::new();
    let grouper = Grouper::from_config(&Config::default()).unwrap();

    let mut old = vec![
        article(HOUSING, "abc-old", Media::Abc),
        article(HOUSING, "pais-old", Media::ElPais),
    ];
    for a in old.iter_mut() {
        a.group = Some(0);
        a.created_at = Utc::now() - Duration::hours(30);
    }
    storage.store_articles(&old).await.unwrap();
    storage
        .store_articles(&[
            article(FOOTBALL, "cope-new", Media::Cope),
            article(FOOTBALL, "rtve-new", Media::Rtve),
        ])
        .await
        .unwrap();

    assert_eq!(group_pending(&storage, &grouper).await.unwrap(), 2);

    let all = storage.all_articles().await.unwrap();
    let group_of = |link: &str| all.iter().find(|a| a.link == link).and_then(|a| a.group);
    assert_eq!(group_of("abc-old"), Some(0));
    assert_eq!(group_of("cope-new"), Some(1));
    assert_eq!(group_of("rtve-new"), Some(1));
    assert_eq!(filter_grouped_news(&all).len(), 2);
}

async fn stub_service(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_failed_remote_grouping_leaves_storage_untouched() {
    let base = stub_service(
        Router::new()
            .route("/garbled", post(|| async { "<html>not json</html>" }))
            .route("/down", post(|| async { StatusCode::INTERNAL_SERVER_ERROR })),
    )
    .await;

    for path in ["garbled", "down"] {
        let storage = MemoryStorage::new();
        storage
            .store_articles(&[
                article(HOUSING, "abc-1", Media::Abc),
                article(HOUSING, "pais-1", Media::ElPais),
            ])
            .await
            .unwrap();
        let client = GroupingClient::new(format!("{}/{}", base, path), Arc::new(StaticToken::new("secret")));
        let grouper = Grouper::remote(client);

        let pending = storage.get_ungrouped().await.unwrap();
        assert!(grouper.group(pending, Vec::new(), 0).await.is_empty());

        assert_eq!(group_pending(&storage, &grouper).await.unwrap(), 0);
        let all = storage.all_articles().await.unwrap();
        assert!(all.iter().all(|a| a.group.is_none()), "{} changed groups", path);
    }
}
