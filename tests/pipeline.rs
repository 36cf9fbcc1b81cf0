// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end pipeline scenarios over the in-memory doubles: one or two
//! replicas sharing a store, a recording broker, scripted sessions.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cacophony_gateway::event::{normalize, DEDUP_TTL};
use cacophony_gateway::handler::MemberBackfill;
use cacophony_gateway::kv::{KeyValueStore, MemoryStore};

use common::{
    guild_create, guild_update, message_create, replica, setup, RecordingConnection,
    BLACKLIST_KEY, WHITELIST_KEY,
};

/// S1: first guild-create on a single replica with the whitelist disabled.
#[tokio::test]
async fn test_first_guild_create_publishes_and_claims() {
    let bundle = setup(false, true).await;
    let dispatch = guild_create("100", "A");

    bundle
        .handler
        .on_platform_event(Some("B1"), &dispatch)
        .await
        .unwrap();

    // Shared state holds the guild with the owning bot recorded.
    let guild = bundle.state.guild("100").await.unwrap().unwrap();
    assert_eq!(guild.name.as_deref(), Some("A"));
    assert_eq!(
        bundle.state.bot_for_guild("100").await.unwrap().unwrap(),
        "B1"
    );

    // One broker message on the type topic with the correlation ids set.
    let messages = bundle.publisher.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].routing_key, "cacophony.discord.guild_create");
    let body = messages[0].body_json();
    assert_eq!(body["type"], "guild_create");
    assert_eq!(body["guildId"], "100");
    assert_eq!(body["botUserId"], "B1");

    // The dedup claim sits in the store under the event's cache key with
    // the 15 minute window.
    let cache_key = normalize("B1", &dispatch).unwrap().cache_key;
    assert!(cache_key.starts_with("gw:guild_create:"));
    let ttl = bundle.kv.ttl_of(&cache_key).unwrap();
    assert!(ttl <= DEDUP_TTL);
    assert!(ttl > DEDUP_TTL - Duration::from_secs(60));
}

/// S2: the same message delivered to two replicas inside the TTL window is
/// published exactly once.
#[tokio::test]
async fn test_duplicate_across_two_replicas() {
    let kv = Arc::new(MemoryStore::new());
    let replica_a = replica(kv.clone(), false, true).await;
    let replica_b = replica(kv.clone(), false, true).await;
    let dispatch = message_create(Some("100"), "M1", "hi");

    replica_a
        .handler
        .on_platform_event(Some("B1"), &dispatch)
        .await
        .unwrap();
    replica_b
        .handler
        .on_platform_event(Some("B1"), &dispatch)
        .await
        .unwrap();

    let published: usize = replica_a.publisher.messages().len() + replica_b.publisher.messages().len();
    assert_eq!(published, 1, "exactly one replica may publish");
    assert_eq!(
        replica_a.publisher.messages().len(),
        1,
        "the first claim wins"
    );
}

/// S3: a guild-update produces the primary message plus a diff event with
/// the pre/post snapshots.
#[tokio::test]
async fn test_guild_update_diff() {
    let bundle = setup(false, true).await;

    bundle
        .handler
        .on_platform_event(Some("B1"), &guild_create("100", "A"))
        .await
        .unwrap();
    bundle.publisher.take_messages();

    bundle
        .handler
        .on_platform_event(Some("B1"), &guild_update("100", "B"))
        .await
        .unwrap();

    let messages = bundle.publisher.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].routing_key, "cacophony.discord.guild_update");
    assert_eq!(messages[1].routing_key, "cacophony.discord.diff_guild");

    let diff = messages[1].body_json();
    assert_eq!(diff["type"], "diff_guild");
    assert_eq!(diff["guildId"], "100");
    assert_eq!(diff["diff_guild"]["old"]["name"], "A");
    assert_eq!(diff["diff_guild"]["new"]["name"], "B");
}

/// An update that is the first observation of the guild emits no diff.
#[tokio::test]
async fn test_first_observation_has_no_diff() {
    let bundle = setup(false, true).await;

    bundle
        .handler
        .on_platform_event(Some("B1"), &guild_update("100", "B"))
        .await
        .unwrap();

    let messages = bundle.publisher.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].routing_key, "cacophony.discord.guild_update");
}

/// S4: a blacklisted guild produces no broker message and no state
/// mutation, even when it is also whitelisted.
#[tokio::test]
async fn test_blacklisted_guild_is_dropped_without_side_effects() {
    let kv = Arc::new(MemoryStore::new());
    kv.set(WHITELIST_KEY, "200").await.unwrap();
    kv.set(BLACKLIST_KEY, "200").await.unwrap();
    let bundle = replica(kv.clone(), true, true).await;

    bundle
        .handler
        .on_platform_event(Some("B1"), &message_create(Some("200"), "M1", "hi"))
        .await
        .unwrap();

    assert!(bundle.publisher.messages().is_empty());
    // Only the two admission keys exist: no dedup claim, no state write.
    assert_eq!(kv.len(), 2);
    assert_eq!(bundle.counters.snapshot().message_create, 0);
}

/// Property 4, second half: a guild that is neither denied nor allowed is
/// not published, but state still reflects the event.
#[tokio::test]
async fn test_unlisted_guild_updates_state_without_publish() {
    let kv = Arc::new(MemoryStore::new());
    kv.set(WHITELIST_KEY, "100").await.unwrap();
    let bundle = replica(kv, true, true).await;

    bundle
        .handler
        .on_platform_event(Some("B1"), &guild_create("500", "Quiet"))
        .await
        .unwrap();

    assert!(bundle.publisher.messages().is_empty());
    let guild = bundle.state.guild("500").await.unwrap().unwrap();
    assert_eq!(guild.name.as_deref(), Some("Quiet"));
}

/// S5: a refresh hitting a store error keeps the last known good snapshot.
#[tokio::test]
async fn test_whitelist_refresh_survives_store_error() {
    let kv = Arc::new(MemoryStore::new());
    kv.set(WHITELIST_KEY, "300").await.unwrap();
    let bundle = replica(kv.clone(), true, true).await;
    assert!(bundle.checker.is_allowed("300"));

    kv.set_failing(true);
    bundle.checker.refresh_once().await;
    assert!(bundle.checker.is_allowed("300"));
    kv.set_failing(false);
}

/// S6: only the session whose bot owns a guild backfills its members.
#[tokio::test]
async fn test_backfill_ownership_election() {
    let bundle = setup(false, true).await;
    bundle
        .handler
        .on_platform_event(Some("B2"), &guild_create("400", "G"))
        .await
        .unwrap();
    assert_eq!(
        bundle.state.bot_for_guild("400").await.unwrap().unwrap(),
        "B2"
    );

    let session_b1 = RecordingConnection::new();
    let session_b2 = RecordingConnection::new();

    let backfill_b1 = MemberBackfill::new(
        bundle.state.clone(),
        bundle.checker.clone(),
        Duration::ZERO,
    )
    .with_spacing(Duration::ZERO);
    let backfill_b2 = MemberBackfill::new(
        bundle.state.clone(),
        bundle.checker.clone(),
        Duration::ZERO,
    )
    .with_spacing(Duration::ZERO);

    backfill_b1.run(&session_b1, "B1").await;
    backfill_b2.run(&session_b2, "B2").await;

    assert!(session_b1.requested_guilds().is_empty());
    assert_eq!(session_b2.requested_guilds(), vec!["400"]);
}

/// The backfill latch holds for the session lifetime; a reconnect must not
/// re-run the enumeration.
#[tokio::test]
async fn test_backfill_runs_once_per_session() {
    let bundle = setup(false, true).await;
    bundle
        .handler
        .on_platform_event(Some("B2"), &guild_create("400", "G"))
        .await
        .unwrap();

    let session = RecordingConnection::new();
    let backfill = MemberBackfill::new(
        bundle.state.clone(),
        bundle.checker.clone(),
        Duration::ZERO,
    )
    .with_spacing(Duration::ZERO);

    backfill.run(&session, "B2").await;
    backfill.run(&session, "B2").await;

    assert_eq!(session.requested_guilds(), vec!["400"]);
}

/// Denied guilds are skipped by the backfill even when owned.
#[tokio::test]
async fn test_backfill_skips_denied_guilds() {
    let kv = Arc::new(MemoryStore::new());
    kv.set(WHITELIST_KEY, "400;401").await.unwrap();
    kv.set(BLACKLIST_KEY, "401").await.unwrap();
    let bundle = replica(kv, true, true).await;

    bundle
        .handler
        .on_platform_event(Some("B2"), &guild_create("400", "G"))
        .await
        .unwrap();
    bundle
        .state
        .apply("B2", &guild_create("401", "H"))
        .await
        .unwrap();

    let session = RecordingConnection::new();
    let backfill = MemberBackfill::new(
        bundle.state.clone(),
        bundle.checker.clone(),
        Duration::ZERO,
    )
    .with_spacing(Duration::ZERO);
    backfill.run(&session, "B2").await;

    assert_eq!(session.requested_guilds(), vec!["400"]);
}
