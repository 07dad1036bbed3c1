//! Integration tests for resource pack loading, the busy gate and resizes.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use futures_util::poll;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{attached_scene, auth, connected_monitor, endpoint, pack, Call, RecordingSurface};
use live_monitor::{
    AttachOutcome, FrameOutcome, HttpResourceFetcher, MonitorError, RenderSurface, ResizeDecision,
    ResourceFetcher, ResourceLoadError, ResourcePack, ScenePhase, SurfaceSize,
};

/// Fetcher returning a canned pack and counting calls.
#[derive(Default)]
struct CountingFetcher {
    calls: Cell<u32>,
    fail: Cell<bool>,
}

#[async_trait(?Send)]
impl ResourceFetcher for CountingFetcher {
    async fn fetch(&self) -> Result<ResourcePack, ResourceLoadError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail.get() {
            return Err(ResourceLoadError::Fetch {
                asset: "info.yml".into(),
                detail: "HTTP 503".into(),
            });
        }
        Ok(pack())
    }
}

// ─── Loads and the busy gate ────────────────────────────────────────────────

#[tokio::test]
async fn test_attach_with_pack_loads_and_becomes_ready() {
    let (monitor, _engine, session) = connected_monitor().await;
    monitor.populate_resource_pack(pack()).await;
    monitor.add_scene(1).unwrap();

    let outcome = monitor
        .attach_render_target(1, RecordingSurface::new() as Rc<dyn RenderSurface>)
        .await;

    assert_eq!(outcome, AttachOutcome::Ready);
    assert_eq!(monitor.scene_phase(1), Some(ScenePhase::Ready));
    assert_eq!(session.count(|c| *c == Call::LoadResources(1)), 1);
    assert!(!monitor.busy_gate().is_held());
}

#[tokio::test]
async fn test_frames_skip_tick_while_loading() {
    let (monitor, _engine, session) = connected_monitor().await;
    monitor.populate_resource_pack(pack()).await;
    session.hold_loads();
    monitor.add_scene(1).unwrap();

    let attach = monitor.attach_render_target(1, RecordingSurface::new() as Rc<dyn RenderSurface>);
    tokio::pin!(attach);
    assert!(poll!(&mut attach).is_pending());
    assert!(monitor.busy_gate().is_held());

    assert_eq!(monitor.frame(16.0), FrameOutcome::SkippedBusy);
    assert_eq!(monitor.frame(32.0), FrameOutcome::SkippedBusy);
    assert_eq!(session.ticks(), 0);

    assert!(session.complete_next_load(Ok(())));
    assert_eq!(attach.await, AttachOutcome::Ready);
    assert!(!monitor.busy_gate().is_held());
    assert_eq!(monitor.frame(48.0), FrameOutcome::Rendered);
    assert_eq!(session.ticks(), 1);
}

#[tokio::test]
async fn test_resize_during_load_is_applied_once_after_release() {
    let (monitor, _engine, session) = connected_monitor().await;
    let surface = attached_scene(&monitor, 2).await;
    session.hold_loads();
    session.clear_calls();

    let load = monitor.populate_resource_pack(pack());
    tokio::pin!(load);
    assert!(poll!(&mut load).is_pending());
    assert!(monitor.busy_gate().is_held());

    assert_eq!(
        monitor.observe_resize(2, SurfaceSize::new(640, 360)),
        ResizeDecision::Defer
    );
    assert_eq!(
        monitor.observe_resize(2, SurfaceSize::new(800, 600)),
        ResizeDecision::Defer
    );
    assert!(surface.sizes().is_empty());
    assert_eq!(session.count(|c| matches!(c, Call::ResizeScene(..))), 0);

    session.complete_next_load(Ok(()));
    let results = load.await;
    assert_eq!(results, vec![(2, AttachOutcome::Ready)]);

    // Only the latest size, exactly once, engine first.
    assert_eq!(surface.sizes(), vec![(800, 600)]);
    assert_eq!(session.count(|c| *c == Call::ResizeScene(2, 800, 600)), 1);
    assert_eq!(session.count(|c| matches!(c, Call::ResizeScene(..))), 1);

    monitor.frame(16.0);
    assert_eq!(session.count(|c| matches!(c, Call::ResizeScene(..))), 1);
    assert_eq!(monitor.status().scenes[0].size, Some(SurfaceSize::new(800, 600)));
}

#[tokio::test]
async fn test_resize_applies_immediately_when_idle() {
    let (monitor, _engine, session) = connected_monitor().await;
    let surface = attached_scene(&monitor, 1).await;

    assert_eq!(
        monitor.observe_resize(1, SurfaceSize::new(1280, 720)),
        ResizeDecision::Apply(SurfaceSize::new(1280, 720))
    );
    assert_eq!(surface.sizes(), vec![(1280, 720)]);

    // Same size again and zero sizes are ignored.
    assert_eq!(
        monitor.observe_resize(1, SurfaceSize::new(1280, 720)),
        ResizeDecision::Ignore
    );
    assert_eq!(
        monitor.observe_resize(1, SurfaceSize::new(0, 720)),
        ResizeDecision::Ignore
    );
    assert_eq!(session.count(|c| matches!(c, Call::ResizeScene(..))), 1);
}

#[tokio::test]
async fn test_resize_before_attach_is_applied_on_attach() {
    let (monitor, _engine, session) = connected_monitor().await;
    monitor.add_scene(1).unwrap();

    assert_eq!(
        monitor.observe_resize(1, SurfaceSize::new(320, 240)),
        ResizeDecision::Defer
    );
    assert_eq!(session.count(|c| matches!(c, Call::ResizeScene(..))), 0);

    let surface = RecordingSurface::new();
    monitor
        .attach_render_target(1, Rc::clone(&surface) as Rc<dyn RenderSurface>)
        .await;

    assert_eq!(surface.sizes(), vec![(320, 240)]);
    assert_eq!(session.count(|c| *c == Call::ResizeScene(1, 320, 240)), 1);
}

#[tokio::test]
async fn test_rejected_resize_leaves_buffer_untouched() {
    let (monitor, _engine, session) = connected_monitor().await;
    let surface = attached_scene(&monitor, 1).await;
    session.fail_resizes(true);

    assert_eq!(
        monitor.observe_resize(1, SurfaceSize::new(4096, 4096)),
        ResizeDecision::Rejected
    );

    assert!(surface.sizes().is_empty());
    assert!(monitor.last_error().is_some());
    assert_eq!(monitor.status().scenes[0].size, None);

    // Once the engine accepts, the same size applies.
    session.fail_resizes(false);
    assert_eq!(
        monitor.observe_resize(1, SurfaceSize::new(4096, 4096)),
        ResizeDecision::Apply(SurfaceSize::new(4096, 4096))
    );
    assert_eq!(surface.sizes(), vec![(4096, 4096)]);
}

#[tokio::test]
async fn test_resize_for_unknown_player_is_ignored() {
    let (monitor, _engine, _session) = connected_monitor().await;

    assert_eq!(
        monitor.observe_resize(9, SurfaceSize::new(100, 100)),
        ResizeDecision::Ignore
    );
}

#[tokio::test]
async fn test_removed_scene_discards_pending_load() {
    let (monitor, _engine, session) = connected_monitor().await;
    monitor.populate_resource_pack(pack()).await;
    session.hold_loads();
    monitor.add_scene(1).unwrap();

    let attach = monitor.attach_render_target(1, RecordingSurface::new() as Rc<dyn RenderSurface>);
    tokio::pin!(attach);
    assert!(poll!(&mut attach).is_pending());

    assert!(monitor.remove_scene(1));
    let readded = monitor.add_scene(1).unwrap();

    session.complete_next_load(Ok(()));
    assert_eq!(attach.await, AttachOutcome::Discarded);

    // The new scene for the same player is untouched by the stale load.
    assert_eq!(monitor.scene_phase(1), Some(ScenePhase::Allocated));
    assert_eq!(monitor.render_target(1), Some(readded));
    assert!(!monitor.busy_gate().is_held());
}

#[tokio::test]
async fn test_disconnect_during_load_discards_result() {
    let (monitor, _engine, session) = connected_monitor().await;
    monitor.populate_resource_pack(pack()).await;
    session.hold_loads();
    monitor.add_scene(1).unwrap();

    let attach = monitor.attach_render_target(1, RecordingSurface::new() as Rc<dyn RenderSurface>);
    tokio::pin!(attach);
    assert!(poll!(&mut attach).is_pending());

    monitor.disconnect();
    session.complete_next_load(Ok(()));

    assert_eq!(attach.await, AttachOutcome::Discarded);
    assert_eq!(monitor.scene_count(), 0);
    assert!(!monitor.busy_gate().is_held());
}

#[tokio::test]
async fn test_load_pending_on_old_session_does_not_gate_reconnect() {
    let (monitor, engine, old_session) = connected_monitor().await;
    monitor.populate_resource_pack(pack()).await;
    old_session.hold_loads();
    monitor.add_scene(1).unwrap();

    let attach = monitor.attach_render_target(1, RecordingSurface::new() as Rc<dyn RenderSurface>);
    tokio::pin!(attach);
    assert!(poll!(&mut attach).is_pending());
    assert!(monitor.busy_gate().is_held());

    assert!(monitor.disconnect());
    assert!(!monitor.busy_gate().is_held());

    monitor.connect(endpoint(), Some(&auth())).await.unwrap();
    let new_session = engine.session();
    assert_eq!(monitor.frame(16.0), FrameOutcome::Rendered);
    assert_eq!(new_session.ticks(), 1);

    // A load on the new session holds the gate; the old load settling late
    // must not release it.
    new_session.hold_loads();
    monitor.add_scene(2).unwrap();
    let second = monitor.attach_render_target(2, RecordingSurface::new() as Rc<dyn RenderSurface>);
    tokio::pin!(second);
    assert!(poll!(&mut second).is_pending());

    old_session.complete_next_load(Ok(()));
    assert_eq!(attach.await, AttachOutcome::Discarded);
    assert!(monitor.busy_gate().is_held());
    assert_eq!(monitor.frame(32.0), FrameOutcome::SkippedBusy);

    new_session.complete_next_load(Ok(()));
    assert_eq!(second.await, AttachOutcome::Ready);
    assert!(!monitor.busy_gate().is_held());
    assert_eq!(monitor.frame(48.0), FrameOutcome::Rendered);
}

#[tokio::test]
async fn test_overlapping_loads_hold_gate_until_last_finishes() {
    let (monitor, _engine, session) = connected_monitor().await;
    attached_scene(&monitor, 1).await;
    attached_scene(&monitor, 2).await;
    session.hold_loads();

    let load = monitor.populate_resource_pack(pack());
    tokio::pin!(load);
    assert!(poll!(&mut load).is_pending());
    assert_eq!(session.pending_loads(), 2);
    assert_eq!(monitor.busy_gate().holders(), 2);

    session.complete_next_load(Ok(()));
    assert!(poll!(&mut load).is_pending());
    assert!(monitor.busy_gate().is_held());

    session.complete_next_load(Ok(()));
    let mut results = load.await;
    results.sort_by_key(|(player, _)| *player);
    assert_eq!(
        results,
        vec![(1, AttachOutcome::Ready), (2, AttachOutcome::Ready)]
    );
    assert!(!monitor.busy_gate().is_held());
}

#[tokio::test]
async fn test_load_failure_keeps_scene_attached() {
    let (monitor, _engine, session) = connected_monitor().await;
    monitor.populate_resource_pack(pack()).await;
    session.fail_loads(true);
    monitor.add_scene(1).unwrap();

    let outcome = monitor
        .attach_render_target(1, RecordingSurface::new() as Rc<dyn RenderSurface>)
        .await;

    assert!(matches!(outcome, AttachOutcome::LoadFailed(_)));
    assert_eq!(monitor.scene_phase(1), Some(ScenePhase::Attached));
    assert!(!monitor.busy_gate().is_held());
    assert!(monitor.last_error().is_some());
}

// ─── Fetch-once ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resource_pack_is_fetched_once() {
    let (monitor, _engine, session) = connected_monitor().await;
    attached_scene(&monitor, 1).await;
    let fetcher = CountingFetcher::default();

    let first = monitor.load_resource_pack(&fetcher).await.unwrap();
    let second = monitor.load_resource_pack(&fetcher).await.unwrap();

    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(first, vec![(1, AttachOutcome::Ready)]);
    assert!(second.is_empty());
    assert!(monitor.has_resource_pack());
    assert_eq!(session.count(|c| *c == Call::LoadResources(1)), 1);
}

#[tokio::test]
async fn test_failed_fetch_can_be_retried() {
    let (monitor, _engine, _session) = connected_monitor().await;
    let fetcher = CountingFetcher::default();
    fetcher.fail.set(true);

    let err = monitor.load_resource_pack(&fetcher).await.unwrap_err();
    assert!(matches!(err, MonitorError::Resource(ResourceLoadError::Fetch { .. })));
    assert!(!monitor.has_resource_pack());

    fetcher.fail.set(false);
    monitor.load_resource_pack(&fetcher).await.unwrap();
    assert_eq!(fetcher.calls.get(), 2);
    assert!(monitor.has_resource_pack());
}

#[tokio::test]
async fn test_populated_pack_skips_ready_and_allocated_scenes() {
    let (monitor, _engine, session) = connected_monitor().await;
    monitor.add_scene(1).unwrap();
    attached_scene(&monitor, 2).await;

    let results = monitor.populate_resource_pack(pack()).await;

    assert_eq!(results, vec![(2, AttachOutcome::Ready)]);
    assert_eq!(session.count(|c| matches!(c, Call::LoadResources(_))), 1);
    assert!(monitor.populate_resource_pack(pack()).await.is_empty());
}

// ─── HTTP fetcher ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_http_fetcher_downloads_every_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/res/info.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"name: default".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/res/click.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .mount(&server)
        .await;

    let fetcher = HttpResourceFetcher::with_files(
        format!("{}/res/", server.uri()),
        vec!["info.yml".into(), "click.png".into()],
    );
    let pack = fetcher.fetch().await.unwrap();

    assert_eq!(pack.len(), 2);
    assert_eq!(pack.get("click.png"), Some(&[1u8, 2, 3][..]));
    assert_eq!(pack.get("info.yml"), Some(&b"name: default"[..]));
}

#[tokio::test]
async fn test_http_fetcher_reports_missing_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&server)
        .await;

    let fetcher =
        HttpResourceFetcher::with_files(server.uri(), vec!["info.yml".into(), "hold.png".into()]);
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(
        err,
        ResourceLoadError::Fetch { ref asset, ref detail } if asset == "hold.png" && detail.contains("404")
    ));
}

#[tokio::test]
async fn test_http_fetcher_rejects_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hit_fx.png"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let fetcher = HttpResourceFetcher::with_files(server.uri(), vec!["hit_fx.png".into()]);
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, ResourceLoadError::Decode { ref asset, .. } if asset == "hit_fx.png"));
}
