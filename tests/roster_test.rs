mod common;

use common::memory_pool;
use correspondent::roster::{parse_interests, parse_sites, Roster, SqliteRoster};
use correspondent::types::{CorrespondentError, NewUser};

fn input(name: &str, email: &str, interests: &str, sites: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        interests: interests.to_string(),
        sites: sites.to_string(),
    }
}

#[tokio::test]
async fn add_and_list_round_trip() {
    let pool = memory_pool().await;
    let roster = SqliteRoster::new(pool);

    let user = roster
        .add_user(input(
            "Ada",
            "ada@example.com",
            "Rust, wasm, rust",
            "https://a.example/feed.xml, https://b.example/feed.xml",
        ))
        .await
        .expect("add user");

    // Interests normalized: lowercased, deduplicated, sorted.
    assert_eq!(user.interests, vec!["rust", "wasm"]);
    assert_eq!(user.sites.len(), 2);

    let listed = roster.list_users().await.expect("list users");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, user.id);
    assert_eq!(listed[0].name, "Ada");
    assert_eq!(listed[0].interests, user.interests);
    assert_eq!(listed[0].sites, user.sites);
}

#[tokio::test]
async fn name_and_email_are_required() {
    let pool = memory_pool().await;
    let roster = SqliteRoster::new(pool);

    let err = roster
        .add_user(input("  ", "ada@example.com", "rust", "https://a.example/"))
        .await
        .unwrap_err();
    assert!(matches!(err, CorrespondentError::InvalidUser(_)));

    let err = roster
        .add_user(input("Ada", "not-an-email", "rust", "https://a.example/"))
        .await
        .unwrap_err();
    assert!(matches!(err, CorrespondentError::InvalidUser(_)));
}

#[tokio::test]
async fn interests_and_sites_must_be_non_empty_after_parsing() {
    let pool = memory_pool().await;
    let roster = SqliteRoster::new(pool);

    let err = roster
        .add_user(input("Ada", "ada@example.com", " , , ", "https://a.example/"))
        .await
        .unwrap_err();
    assert!(matches!(err, CorrespondentError::InvalidUser(_)));

    let err = roster
        .add_user(input("Ada", "ada@example.com", "rust", "  ,  "))
        .await
        .unwrap_err();
    assert!(matches!(err, CorrespondentError::InvalidUser(_)));
}

#[test]
fn sites_must_be_absolute_urls() {
    let err = parse_sites("not a url").unwrap_err();
    assert!(matches!(err, CorrespondentError::InvalidUrl(_)));

    let sites = parse_sites("https://a.example/feed.xml, https://a.example/feed.xml")
        .expect("parse sites");
    assert_eq!(sites.len(), 1);
}

#[test]
fn interests_are_normalized() {
    let interests = parse_interests("Wasm, RUST , rust,  ,embedded").expect("parse interests");
    assert_eq!(interests, vec!["embedded", "rust", "wasm"]);
}
